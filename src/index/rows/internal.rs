use bytes::BufMut;
use crate::core::error::{Error, Result};
use crate::index::rows::{RowCodec, INTERNAL_PREFIX};

/// Opaque key/value pair stored on behalf of collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalRow {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl InternalRow {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        InternalRow { key, value }
    }

    pub fn key_for(key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(key.len() + 1);
        out.put_u8(INTERNAL_PREFIX);
        out.put_slice(key);
        out
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        match key.split_first() {
            Some((&INTERNAL_PREFIX, rest)) => Ok(InternalRow::new(rest.to_vec(), value.to_vec())),
            _ => Err(Error::corrupt("internal key must start with 'i'")),
        }
    }
}

impl RowCodec for InternalRow {
    fn key_size(&self) -> usize {
        1 + self.key.len()
    }

    fn value_size(&self) -> usize {
        self.value.len()
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(INTERNAL_PREFIX);
        buf.put_slice(&self.key);
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.value);
    }
}
