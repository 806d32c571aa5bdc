use bytes::BufMut;
use crate::core::error::{Error, Result};
use crate::index::rows::{RowCodec, VERSION_KEY};

/// Schema version sentinel, written once when a store is initialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRow {
    pub version: u8,
}

impl VersionRow {
    pub fn new(version: u8) -> Self {
        VersionRow { version }
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        if key != VERSION_KEY {
            return Err(Error::corrupt("version row key mismatch"));
        }
        match value {
            [version] => Ok(VersionRow { version: *version }),
            _ => Err(Error::corrupt(format!("version value must be 1 byte, got {}", value.len()))),
        }
    }
}

impl RowCodec for VersionRow {
    fn key_size(&self) -> usize {
        VERSION_KEY.len()
    }

    fn value_size(&self) -> usize {
        1
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(VERSION_KEY);
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version);
    }
}
