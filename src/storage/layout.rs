use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;

/// Directory structure of a log-backed store
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub wal_dir: PathBuf,       // Operation log location
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let wal_dir = base_dir.join("wal");

        fs::create_dir_all(&wal_dir)?;

        Ok(StorageLayout { base_dir, wal_dir })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.wal_dir.join("ops.log")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }
}
