use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::kvstore::{KVStore, MergeOperator};
use crate::storage::log_store::{self, LogStore};
use crate::storage::mem_store::{self, MemStore};

/// Builds a store from the index configuration and its merge operator
pub type StoreFactory =
    Arc<dyn Fn(&Config, Arc<dyn MergeOperator>) -> Result<Arc<dyn KVStore>> + Send + Sync>;

/// Registry of KV backends, looked up by `Config::store`
pub struct StoreRegistry {
    factories: RwLock<HashMap<String, StoreFactory>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        let registry = StoreRegistry {
            factories: RwLock::new(HashMap::new()),
        };

        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register(mem_store::NAME, Arc::new(|_config: &Config, merge: Arc<dyn MergeOperator>| {
            Ok(Arc::new(MemStore::new(merge)) as Arc<dyn KVStore>)
        }));
        self.register(log_store::NAME, Arc::new(|config: &Config, merge: Arc<dyn MergeOperator>| {
            let store = LogStore::open(&config.storage_path, config.sync_mode, merge)?;
            Ok(Arc::new(store) as Arc<dyn KVStore>)
        }));
    }

    pub fn register(&self, name: &str, factory: StoreFactory) {
        self.factories.write().insert(name.to_string(), factory);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(&self, config: &Config, merge: Arc<dyn MergeOperator>) -> Result<Arc<dyn KVStore>> {
        let factory = self.factories.read().get(&config.store).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownBackend,
                format!("no KV store registered under '{}'", config.store),
            )
        })?;
        factory(config, merge)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}
