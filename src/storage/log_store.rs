use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::info;
use crate::core::error::Result;
use crate::storage::file_lock::FileLock;
use crate::storage::kvstore::{apply_resolved, KVBatch, KVReader, KVStore, KVWriter, MergeOperator};
use crate::storage::layout::StorageLayout;
use crate::storage::mem_store::{MemReader, MemStore};
use crate::storage::wal::{SyncMode, WAL};

pub const NAME: &str = "log";

struct LogShared {
    mem: MemStore,
    wal: Mutex<WAL>,
    layout: StorageLayout,
    _lock: FileLock,
}

/// Durable store: the ordered map lives in memory and every committed batch
/// is appended to a checksummed log, replayed on open.
#[derive(Clone)]
pub struct LogStore {
    shared: Arc<LogShared>,
}

impl LogStore {
    pub fn open(path: &Path, sync_mode: SyncMode, merge: Arc<dyn MergeOperator>) -> Result<Self> {
        let layout = StorageLayout::new(path)?;
        let lock = FileLock::acquire(&layout)?;
        let mut wal = WAL::open(&layout, sync_mode)?;

        let mut data = BTreeMap::new();
        let records = wal.read_entries()?;
        let replayed = records.len();
        for record in records {
            apply_resolved(&mut data, record.ops);
        }
        info!(
            path = %layout.base_dir.display(),
            records = replayed,
            keys = data.len(),
            "log store opened"
        );

        Ok(LogStore {
            shared: Arc::new(LogShared {
                mem: MemStore::with_data(data, merge),
                wal: Mutex::new(wal),
                layout,
                _lock: lock,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.layout.base_dir
    }
}

impl KVStore for LogStore {
    fn reader(&self) -> Result<Box<dyn KVReader>> {
        self.shared.mem.ensure_open()?;
        Ok(Box::new(MemReader::new(self.shared.mem.snapshot())))
    }

    fn writer(&self) -> Result<Box<dyn KVWriter>> {
        self.shared.mem.ensure_open()?;
        Ok(Box::new(LogWriter { store: self.clone() }))
    }

    fn close(&self) -> Result<()> {
        self.shared.mem.mark_closed();
        self.shared.wal.lock().sync()
    }

    fn name(&self) -> &str {
        NAME
    }
}

pub struct LogWriter {
    store: LogStore,
}

impl KVWriter for LogWriter {
    fn execute_batch(&mut self, batch: &KVBatch) -> Result<()> {
        let shared = &self.store.shared;
        shared.mem.ensure_open()?;
        let _guard = shared.mem.lock_writes();

        let ops = shared.mem.resolve(batch)?;
        // Logged before it becomes visible; a failed append leaves the map untouched
        shared.wal.lock().append(ops.clone())?;
        shared.mem.apply(ops);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
