use bytes::BufMut;
use chrono::{DateTime, Utc};
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};
use crate::core::types::FieldValue;
use crate::index::rows::{decode_field_id, decode_utf8, RowCodec, SEPARATOR, STORED_PREFIX};

pub const TEXT_TAG: u8 = b't';
pub const NUMBER_TAG: u8 = b'n';
pub const DATE_TAG: u8 = b'd';
pub const BOOLEAN_TAG: u8 = b'b';

/// Verbatim stored field value: one-byte type tag followed by raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub doc_id: String,
    pub field: u16,
    pub array_positions: Vec<u64>,
    pub type_tag: u8,
    pub value: Vec<u8>,
}

impl StoredRow {
    pub fn new(
        doc_id: impl Into<String>,
        field: u16,
        array_positions: Vec<u64>,
        type_tag: u8,
        value: Vec<u8>,
    ) -> Self {
        StoredRow {
            doc_id: doc_id.into(),
            field,
            array_positions,
            type_tag,
            value,
        }
    }

    pub fn key_only(doc_id: impl Into<String>, field: u16, array_positions: Vec<u64>) -> Self {
        Self::new(doc_id, field, array_positions, 0, Vec::new())
    }

    pub fn from_field_value(
        doc_id: impl Into<String>,
        field: u16,
        array_positions: Vec<u64>,
        value: &FieldValue,
    ) -> Self {
        let (type_tag, raw) = match value {
            FieldValue::Text(text) => (TEXT_TAG, text.as_bytes().to_vec()),
            FieldValue::Number(n) => (NUMBER_TAG, n.to_be_bytes().to_vec()),
            FieldValue::Date(date) => (DATE_TAG, date.to_rfc3339().into_bytes()),
            FieldValue::Boolean(b) => (BOOLEAN_TAG, vec![*b as u8]),
        };
        Self::new(doc_id, field, array_positions, type_tag, raw)
    }

    /// Rebuild the typed value from the tag and raw bytes
    pub fn field_value(&self) -> Result<FieldValue> {
        match self.type_tag {
            TEXT_TAG => Ok(FieldValue::Text(decode_utf8(&self.value, "stored text")?)),
            NUMBER_TAG => {
                let raw: [u8; 8] = self.value.as_slice().try_into()
                    .map_err(|_| Error::corrupt("stored number must be 8 bytes"))?;
                Ok(FieldValue::Number(f64::from_be_bytes(raw)))
            }
            DATE_TAG => {
                let text = decode_utf8(&self.value, "stored date")?;
                let date = DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| Error::corrupt(format!("stored date: {}", e)))?;
                Ok(FieldValue::Date(date.with_timezone(&Utc)))
            }
            BOOLEAN_TAG => match self.value.as_slice() {
                [b] => Ok(FieldValue::Boolean(*b != 0)),
                _ => Err(Error::corrupt("stored boolean must be 1 byte")),
            },
            other => Err(Error::corrupt(format!("unknown stored type tag 0x{:02x}", other))),
        }
    }

    /// Key prefix shared by every stored field of `doc_id`
    pub fn document_prefix(doc_id: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(doc_id.len() + 2);
        prefix.put_u8(STORED_PREFIX);
        prefix.put_slice(doc_id.as_bytes());
        prefix.put_u8(SEPARATOR);
        prefix
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        let mut row = Self::parse_key(key)?;
        match value.split_first() {
            Some((tag, raw)) => {
                row.type_tag = *tag;
                row.value = raw.to_vec();
            }
            None => return Err(Error::corrupt("stored value missing type tag")),
        }
        Ok(row)
    }

    pub fn parse_key(key: &[u8]) -> Result<Self> {
        let body = match key.split_first() {
            Some((&STORED_PREFIX, body)) => body,
            _ => return Err(Error::corrupt("stored key must start with 's'")),
        };
        let sep = body
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or_else(|| Error::corrupt("stored key missing document separator"))?;
        let doc_id = decode_utf8(&body[..sep], "document id")?;

        let rest = &body[sep + 1..];
        if rest.len() < 2 {
            return Err(Error::corrupt("stored key missing field id"));
        }
        let field = decode_field_id(&rest[..2])?;

        let mut input = &rest[2..];
        let mut array_positions = Vec::new();
        while !input.is_empty() {
            array_positions.push(VByteEncoder::read_u64(&mut input)?);
        }

        Ok(Self::key_only(doc_id, field, array_positions))
    }
}

impl RowCodec for StoredRow {
    fn key_size(&self) -> usize {
        1 + self.doc_id.len()
            + 1
            + 2
            + self.array_positions.iter().map(|&p| VByteEncoder::encoded_len(p)).sum::<usize>()
    }

    fn value_size(&self) -> usize {
        1 + self.value.len()
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(STORED_PREFIX);
        buf.put_slice(self.doc_id.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_u16(self.field);
        for &p in &self.array_positions {
            VByteEncoder::encode_u64(buf, p);
        }
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.type_tag);
        buf.put_slice(&self.value);
    }
}
