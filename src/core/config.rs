use std::fs;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use crate::core::error::Result;
use crate::storage::wal::SyncMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the registered KV backend ("mem", "log", or a custom one)
    pub store: String,
    pub storage_path: PathBuf,
    pub sync_mode: SyncMode,

    pub analysis_workers: usize,
    pub analysis_queue_size: usize,
    pub default_analyzer: String,

    pub buffer_pool_size: usize,                // Max pooled batch arenas
}

impl Config {
    pub fn in_memory() -> Self {
        Config::default()
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Config {
            store: "log".to_string(),
            storage_path: path.into(),
            ..Config::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: "mem".to_string(),
            storage_path: PathBuf::from("./data"),
            sync_mode: SyncMode::Batch,

            analysis_workers: num_cpus::get().max(1),
            analysis_queue_size: 1024,
            default_analyzer: "simple".to_string(),

            buffer_pool_size: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = Config::from_json(r#"{"store": "log", "storage_path": "/tmp/idx"}"#).unwrap();
        assert_eq!(config.store, "log");
        assert_eq!(config.storage_path, PathBuf::from("/tmp/idx"));
        assert_eq!(config.default_analyzer, "simple");
        assert!(config.analysis_workers >= 1);
    }

    #[test]
    fn sync_mode_parses() {
        let config = Config::from_json(r#"{"sync_mode": "Immediate"}"#).unwrap();
        assert_eq!(config.sync_mode, SyncMode::Immediate);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Config::from_json("{store:").unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Parse);
    }
}
