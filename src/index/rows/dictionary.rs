use bytes::BufMut;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};
use crate::index::rows::{decode_field_id, decode_utf8, RowCodec, DICTIONARY_PREFIX, SEPARATOR};

/// Live-posting counter for one (term, field) pair.
///
/// The counter is only ever adjusted through the store's merge operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRow {
    pub term: String,
    pub field: u16,
    pub count: u64,
}

impl DictionaryRow {
    pub fn new(term: impl Into<String>, field: u16, count: u64) -> Self {
        DictionaryRow { term: term.into(), field, count }
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        let (term, field) = Self::parse_key(key)?;
        Ok(DictionaryRow {
            term,
            field,
            count: Self::decode_count(value)?,
        })
    }

    pub fn parse_key(key: &[u8]) -> Result<(String, u16)> {
        // prefix + term + separator + 2 byte field
        if key.len() < 4 || key[0] != DICTIONARY_PREFIX {
            return Err(Error::corrupt(format!("dictionary key too short or mis-prefixed ({} bytes)", key.len())));
        }
        let split = key.len() - 3;
        if key[split] != SEPARATOR {
            return Err(Error::corrupt("dictionary key missing separator"));
        }
        let term = decode_utf8(&key[1..split], "dictionary term")?;
        let field = decode_field_id(&key[split + 1..])?;
        Ok((term, field))
    }

    pub fn decode_count(value: &[u8]) -> Result<u64> {
        let (count, consumed) = VByteEncoder::decode_u64(value)?;
        if consumed != value.len() {
            return Err(Error::corrupt("trailing bytes after dictionary count"));
        }
        Ok(count)
    }

    pub fn encode_count(count: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(VByteEncoder::encoded_len(count));
        VByteEncoder::encode_u64(&mut out, count);
        out
    }
}

impl RowCodec for DictionaryRow {
    fn key_size(&self) -> usize {
        1 + self.term.len() + 1 + 2
    }

    fn value_size(&self) -> usize {
        VByteEncoder::encoded_len(self.count)
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(DICTIONARY_PREFIX);
        buf.put_slice(self.term.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_u16(self.field);
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        VByteEncoder::encode_u64(buf, self.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_term_round_trips() {
        let row = DictionaryRow::new("", 0, 0);
        assert_eq!(row.key(), vec![DICTIONARY_PREFIX, SEPARATOR, 0, 0]);
        assert_eq!(DictionaryRow::from_kv(&row.key(), &row.value()).unwrap(), row);
    }

    #[test]
    fn field_id_with_separator_byte() {
        // 0x00ff would confuse a left-to-right scan; parsing from the end does not
        let row = DictionaryRow::new("cat", 0x00ff, 12);
        assert_eq!(DictionaryRow::from_kv(&row.key(), &row.value()).unwrap(), row);
    }

    #[test]
    fn structural_errors() {
        assert!(DictionaryRow::from_kv(b"d\xff\x00", b"\x01").is_err());
        assert!(DictionaryRow::from_kv(b"dcat\x00\x00\x01", b"\x01").is_err());
        assert!(DictionaryRow::from_kv(b"dcat\xff\x00\x01", b"").is_err());
        assert!(DictionaryRow::from_kv(b"dcat\xff\x00\x01", b"\x01\x01").is_err());
    }
}
