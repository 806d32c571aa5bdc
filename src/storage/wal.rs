use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::kvstore::ResolvedOp;
use crate::storage::layout::StorageLayout;

/// Upper bound on one encoded record; anything larger is treated as a torn tail
const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

/// Bytes appended between fsyncs in `SyncMode::Batch`
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;

/// Write-ahead log of committed batches
pub struct WAL {
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub sequence: u64,
    unsynced: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync periodically
    None,       // Let OS handle it
}

/// One committed batch, merges already resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub ops: Vec<ResolvedOp>,
}

impl WAL {
    pub fn open(storage: &StorageLayout, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(storage.wal_path())?;
        let position = file.metadata()?.len();

        Ok(WAL {
            file,
            position,
            sync_mode,
            sequence: 0,
            unsynced: 0,
        })
    }

    /// Append a batch. The record is on disk (modulo sync mode) before this returns.
    ///
    /// On failure the file is cut back to the end of the last acknowledged
    /// record, so a partial frame never sits in front of later commits.
    pub fn append(&mut self, ops: Vec<ResolvedOp>) -> Result<u64> {
        let record = LogRecord {
            sequence: self.sequence + 1,
            timestamp: Utc::now(),
            ops,
        };

        let data = bincode::serialize(&record)?;
        let len = data.len() as u32;
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(8 + data.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&data);

        self.discard_unacknowledged()?;
        let start = self.position;
        if let Err(e) = self.write_frame(&frame) {
            self.rollback(start);
            return Err(e);
        }

        self.sequence = record.sequence;
        Ok(record.sequence)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.position += frame.len() as u64;
        self.unsynced += frame.len() as u64;

        match self.sync_mode {
            SyncMode::Immediate => self.sync(),
            SyncMode::Batch if self.unsynced >= BATCH_SYNC_BYTES => self.sync(),
            _ => Ok(()),
        }
    }

    fn rollback(&mut self, start: u64) {
        self.position = start;
        // A failed cut is retried by the next append
        if let Err(e) = self.file.set_len(start) {
            warn!(position = start, error = %e, "failed to cut partial log record");
        }
    }

    /// Drop bytes past the last acknowledged record left by an earlier failed write
    fn discard_unacknowledged(&mut self) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        if file_len < self.position {
            return Err(Error::corrupt(format!(
                "log is {} bytes but {} bytes were acknowledged",
                file_len, self.position
            )));
        }
        if file_len > self.position {
            warn!(
                position = self.position,
                discarded_bytes = file_len - self.position,
                "discarding unacknowledged log bytes"
            );
            self.file.set_len(self.position)?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Read every intact record from the start of the log.
    ///
    /// A truncated or checksum-failing tail is cut off so later appends
    /// start on a clean boundary.
    pub fn read_entries(&mut self) -> Result<Vec<LogRecord>> {
        let mut entries = Vec::new();
        let mut good_end = 0u64;

        self.file.seek(SeekFrom::Start(0))?;
        let file_len = self.file.metadata()?.len();
        let mut reader = BufReader::new(&self.file);

        loop {
            let mut header = [0u8; 8];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::new(ErrorKind::Io, format!("failed to read log: {}", e))),
            }

            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if len > MAX_RECORD_LEN || good_end + 8 + len as u64 > file_len {
                break;
            }

            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if crc32fast::hash(&data) != crc {
                break;
            }

            match bincode::deserialize::<LogRecord>(&data) {
                Ok(record) => {
                    self.sequence = record.sequence;
                    entries.push(record);
                }
                Err(_) => break,
            }
            good_end += 8 + len as u64;
        }
        drop(reader);

        if good_end < file_len {
            warn!(
                discarded_bytes = file_len - good_end,
                records = entries.len(),
                "truncating torn log tail"
            );
            self.file.set_len(good_end)?;
            self.file.sync_all()?;
        }
        self.position = self.file.seek(SeekFrom::End(0))?;
        debug!(records = entries.len(), position = self.position, "log replay read");

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(key: &str) -> Vec<ResolvedOp> {
        vec![
            ResolvedOp::Set(key.as_bytes().to_vec(), b"v".to_vec()),
            ResolvedOp::Delete(b"gone".to_vec()),
        ]
    }

    #[test]
    fn appended_records_replay_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).unwrap();
        {
            let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
            assert_eq!(wal.append(ops("a")).unwrap(), 1);
            assert_eq!(wal.append(ops("b")).unwrap(), 2);
        }

        let mut wal = WAL::open(&layout, SyncMode::None).unwrap();
        let records = wal.read_entries().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].ops, ops("b"));
        assert_eq!(wal.sequence, 2);
        assert_eq!(wal.append(ops("c")).unwrap(), 3);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).unwrap();
        let intact_len = {
            let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
            wal.append(ops("a")).unwrap();
            let intact = wal.position;
            wal.append(ops("b")).unwrap();
            intact
        };

        // chop the second record in half
        let full = std::fs::metadata(layout.wal_path()).unwrap().len();
        let file = OpenOptions::new().write(true).open(layout.wal_path()).unwrap();
        file.set_len(intact_len + (full - intact_len) / 2).unwrap();
        drop(file);

        let mut wal = WAL::open(&layout, SyncMode::None).unwrap();
        let records = wal.read_entries().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(wal.position, intact_len);
        assert_eq!(std::fs::metadata(layout.wal_path()).unwrap().len(), intact_len);
    }

    #[test]
    fn partial_frame_from_failed_write_does_not_hide_later_records() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).unwrap();
        {
            let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
            wal.append(ops("a")).unwrap();

            // what a write_all that dies midway leaves behind
            let mut raw = OpenOptions::new().append(true).open(layout.wal_path()).unwrap();
            raw.write_all(&[0x40, 0, 0, 0, 1, 2, 3, 4, 9, 9, 9, 9]).unwrap();
            drop(raw);

            wal.append(ops("b")).unwrap();
            wal.append(ops("c")).unwrap();
            assert_eq!(std::fs::metadata(layout.wal_path()).unwrap().len(), wal.position);
        }

        let mut wal = WAL::open(&layout, SyncMode::None).unwrap();
        let records = wal.read_entries().unwrap();
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(records[2].ops, ops("c"));
    }

    #[test]
    fn reopened_log_appends_after_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).unwrap();
        let first_len = {
            let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
            wal.append(ops("a")).unwrap();
            wal.position
        };

        let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
        assert_eq!(wal.position, first_len);
        wal.append(ops("b")).unwrap();

        let mut wal = WAL::open(&layout, SyncMode::None).unwrap();
        assert_eq!(wal.read_entries().unwrap().len(), 2);
    }

    #[test]
    fn checksum_mismatch_stops_replay() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).unwrap();
        {
            let mut wal = WAL::open(&layout, SyncMode::Immediate).unwrap();
            wal.append(ops("a")).unwrap();
        }
        let mut raw = std::fs::read(layout.wal_path()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x55;
        std::fs::write(layout.wal_path(), &raw).unwrap();

        let mut wal = WAL::open(&layout, SyncMode::None).unwrap();
        assert!(wal.read_entries().unwrap().is_empty());
    }
}
