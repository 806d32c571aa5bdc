use bytes::BufMut;
use crate::core::error::{Error, Result};
use crate::index::rows::{decode_field_id, decode_utf8, RowCodec, FIELD_PREFIX};

/// Persisted half of the field catalog: numeric ID -> field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub index: u16,
    pub name: String,
}

impl FieldRow {
    pub fn new(index: u16, name: impl Into<String>) -> Self {
        FieldRow { index, name: name.into() }
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        match key.split_first() {
            Some((&FIELD_PREFIX, id)) => Ok(FieldRow {
                index: decode_field_id(id)?,
                name: decode_utf8(value, "field name")?,
            }),
            _ => Err(Error::corrupt("field row key must start with 'f'")),
        }
    }
}

impl RowCodec for FieldRow {
    fn key_size(&self) -> usize {
        3
    }

    fn value_size(&self) -> usize {
        self.name.len()
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(FIELD_PREFIX);
        buf.put_u16(self.index);
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.name.as_bytes());
    }
}
