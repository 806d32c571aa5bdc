//! Binary layout of every row the index writes into the KV store.
//!
//! All rows share one flat ordered namespace. The first key byte names the row
//! kind so related rows sort together:
//!
//! | kind           | key                                              |
//! |----------------|--------------------------------------------------|
//! | Version        | `v`                                              |
//! | Field          | `f` field(u16 BE)                                |
//! | Dictionary     | `d` term 0xFF field(u16 BE)                      |
//! | TermFrequency  | `t` term 0xFF field(u16 BE) 0xFF doc_id          |
//! | Stored         | `s` doc_id 0xFF field(u16 BE) varint positions   |
//! | BackIndex      | `b` doc_id                                       |
//! | Internal       | `i` key                                          |
//!
//! Terms and document IDs are UTF-8, so 0xFF never appears inside them.

pub mod version;
pub mod field;
pub mod dictionary;
pub mod term_frequency;
pub mod stored;
pub mod back_index;
pub mod internal;

use bytes::BufMut;
use crate::core::error::{Error, ErrorKind, Result};

pub use version::VersionRow;
pub use field::FieldRow;
pub use dictionary::DictionaryRow;
pub use term_frequency::{TermFrequencyRow, TermVector};
pub use stored::StoredRow;
pub use back_index::{BackIndexRow, BackIndexStoreEntry, BackIndexTermEntry};
pub use internal::InternalRow;

/// Schema version written into the Version row.
pub const SCHEMA_VERSION: u8 = 7;

pub const VERSION_KEY: &[u8] = b"v";
pub const FIELD_PREFIX: u8 = b'f';
pub const DICTIONARY_PREFIX: u8 = b'd';
pub const TERM_FREQUENCY_PREFIX: u8 = b't';
pub const STORED_PREFIX: u8 = b's';
pub const BACK_INDEX_PREFIX: u8 = b'b';
pub const INTERNAL_PREFIX: u8 = b'i';

pub const SEPARATOR: u8 = 0xff;

/// Key/value serialization shared by every row kind
pub trait RowCodec {
    fn key_size(&self) -> usize;
    fn value_size(&self) -> usize;

    fn write_key<B: BufMut>(&self, buf: &mut B);
    fn write_value<B: BufMut>(&self, buf: &mut B);

    /// Serialize the key into `buf`, returning the bytes written
    fn key_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.key_size();
        check_capacity("key", size, buf.len())?;
        let mut out = &mut buf[..size];
        self.write_key(&mut out);
        Ok(size)
    }

    fn value_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.value_size();
        check_capacity("value", size, buf.len())?;
        let mut out = &mut buf[..size];
        self.write_value(&mut out);
        Ok(size)
    }

    fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.key_size());
        self.write_key(&mut key);
        key
    }

    fn value(&self) -> Vec<u8> {
        let mut value = Vec::with_capacity(self.value_size());
        self.write_value(&mut value);
        value
    }
}

fn check_capacity(what: &str, need: usize, have: usize) -> Result<()> {
    if have < need {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("{} buffer too small: need {} bytes, have {}", what, need, have),
        ));
    }
    Ok(())
}

/// Closed set of row kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Version(VersionRow),
    Field(FieldRow),
    Dictionary(DictionaryRow),
    TermFrequency(TermFrequencyRow),
    Stored(StoredRow),
    BackIndex(BackIndexRow),
    Internal(InternalRow),
}

impl Row {
    /// Decode a raw pair read off the store, dispatching on the key prefix
    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Row> {
        match key.first() {
            Some(b'v') => Ok(Row::Version(VersionRow::from_kv(key, value)?)),
            Some(&FIELD_PREFIX) => Ok(Row::Field(FieldRow::from_kv(key, value)?)),
            Some(&DICTIONARY_PREFIX) => Ok(Row::Dictionary(DictionaryRow::from_kv(key, value)?)),
            Some(&TERM_FREQUENCY_PREFIX) => Ok(Row::TermFrequency(TermFrequencyRow::from_kv(key, value)?)),
            Some(&STORED_PREFIX) => Ok(Row::Stored(StoredRow::from_kv(key, value)?)),
            Some(&BACK_INDEX_PREFIX) => Ok(Row::BackIndex(BackIndexRow::from_kv(key, value)?)),
            Some(&INTERNAL_PREFIX) => Ok(Row::Internal(InternalRow::from_kv(key, value)?)),
            Some(other) => Err(Error::corrupt(format!("unknown row prefix 0x{:02x}", other))),
            None => Err(Error::corrupt("empty row key")),
        }
    }
}

macro_rules! dispatch {
    ($row:expr, $r:ident => $body:expr) => {
        match $row {
            Row::Version($r) => $body,
            Row::Field($r) => $body,
            Row::Dictionary($r) => $body,
            Row::TermFrequency($r) => $body,
            Row::Stored($r) => $body,
            Row::BackIndex($r) => $body,
            Row::Internal($r) => $body,
        }
    };
}

impl RowCodec for Row {
    fn key_size(&self) -> usize {
        dispatch!(self, r => r.key_size())
    }

    fn value_size(&self) -> usize {
        dispatch!(self, r => r.value_size())
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        dispatch!(self, r => r.write_key(buf))
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        dispatch!(self, r => r.write_value(buf))
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Used as the exclusive end of `[start, increment_bytes(end))` scans. Returns
/// `None` when no such key exists (empty or all-0xFF input), meaning the scan
/// is unbounded above.
pub fn increment_bytes(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last < 0xff {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}

pub(crate) fn decode_utf8(bytes: &[u8], what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::corrupt(format!("{} is not valid UTF-8", what)))
}

pub(crate) fn decode_field_id(bytes: &[u8]) -> Result<u16> {
    match bytes {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::corrupt(format!("field id must be 2 bytes, got {}", bytes.len()))),
    }
}

pub(crate) fn decode_field_varint(input: &mut &[u8]) -> Result<u16> {
    let raw = crate::compression::vbyte::VByteEncoder::read_u64(input)?;
    u16::try_from(raw).map_err(|_| Error::corrupt(format!("field id {} out of range", raw)))
}

/// Guard against length prefixes that promise more items than bytes remain.
pub(crate) fn check_count(count: u64, remaining: usize, what: &str) -> Result<usize> {
    if count > remaining as u64 {
        return Err(Error::corrupt(format!(
            "{} count {} exceeds remaining {} bytes", what, count, remaining
        )));
    }
    Ok(count as usize)
}
