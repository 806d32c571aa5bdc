use bytes::BufMut;
use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};
use crate::index::rows::{
    check_count, decode_field_varint, decode_utf8, RowCodec, StoredRow, TermFrequencyRow,
    BACK_INDEX_PREFIX,
};

/// (term, field) of one posting written for the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackIndexTermEntry {
    pub term: String,
    pub field: u16,
}

/// (field, array path) of one stored value written for the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackIndexStoreEntry {
    pub field: u16,
    pub array_positions: Vec<u64>,
}

/// Reverse map from a document to every posting and stored key live for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackIndexRow {
    pub doc_id: String,
    pub term_entries: Vec<BackIndexTermEntry>,
    pub stored_entries: Vec<BackIndexStoreEntry>,
}

impl BackIndexRow {
    pub fn new(
        doc_id: impl Into<String>,
        term_entries: Vec<BackIndexTermEntry>,
        stored_entries: Vec<BackIndexStoreEntry>,
    ) -> Self {
        BackIndexRow {
            doc_id: doc_id.into(),
            term_entries,
            stored_entries,
        }
    }

    pub fn key_only(doc_id: impl Into<String>) -> Self {
        Self::new(doc_id, Vec::new(), Vec::new())
    }

    /// Key-only posting rows for every term entry
    pub fn term_frequency_rows(&self) -> impl Iterator<Item = TermFrequencyRow> + '_ {
        self.term_entries
            .iter()
            .map(|e| TermFrequencyRow::key_only(e.term.as_str(), e.field, self.doc_id.as_str()))
    }

    /// Key-only stored rows for every stored entry
    pub fn stored_rows(&self) -> impl Iterator<Item = StoredRow> + '_ {
        self.stored_entries
            .iter()
            .map(|e| StoredRow::key_only(self.doc_id.as_str(), e.field, e.array_positions.clone()))
    }

    pub fn from_kv(key: &[u8], value: &[u8]) -> Result<Self> {
        let doc_id = match key.split_first() {
            Some((&BACK_INDEX_PREFIX, id)) => decode_utf8(id, "document id")?,
            _ => return Err(Error::corrupt("back index key must start with 'b'")),
        };

        let mut input = value;
        let count = VByteEncoder::read_u64(&mut input)?;
        let count = check_count(count, input.len(), "back index term")?;
        let mut term_entries = Vec::with_capacity(count);
        for _ in 0..count {
            let len = VByteEncoder::read_u64(&mut input)?;
            let len = check_count(len, input.len(), "term byte")?;
            let term = decode_utf8(&input[..len], "back index term")?;
            input = &input[len..];
            let field = decode_field_varint(&mut input)?;
            term_entries.push(BackIndexTermEntry { term, field });
        }

        let count = VByteEncoder::read_u64(&mut input)?;
        let count = check_count(count, input.len(), "back index stored")?;
        let mut stored_entries = Vec::with_capacity(count);
        for _ in 0..count {
            let field = decode_field_varint(&mut input)?;
            let n = VByteEncoder::read_u64(&mut input)?;
            let n = check_count(n, input.len(), "array position")?;
            let mut array_positions = Vec::with_capacity(n);
            for _ in 0..n {
                array_positions.push(VByteEncoder::read_u64(&mut input)?);
            }
            stored_entries.push(BackIndexStoreEntry { field, array_positions });
        }

        if !input.is_empty() {
            return Err(Error::corrupt(format!("{} trailing bytes after back index entries", input.len())));
        }

        Ok(BackIndexRow { doc_id, term_entries, stored_entries })
    }
}

impl RowCodec for BackIndexRow {
    fn key_size(&self) -> usize {
        1 + self.doc_id.len()
    }

    fn value_size(&self) -> usize {
        let terms: usize = self.term_entries.iter()
            .map(|e| {
                VByteEncoder::encoded_len(e.term.len() as u64)
                    + e.term.len()
                    + VByteEncoder::encoded_len(e.field as u64)
            })
            .sum();
        let stored: usize = self.stored_entries.iter()
            .map(|e| {
                VByteEncoder::encoded_len(e.field as u64)
                    + VByteEncoder::encoded_len(e.array_positions.len() as u64)
                    + e.array_positions.iter().map(|&p| VByteEncoder::encoded_len(p)).sum::<usize>()
            })
            .sum();

        VByteEncoder::encoded_len(self.term_entries.len() as u64)
            + terms
            + VByteEncoder::encoded_len(self.stored_entries.len() as u64)
            + stored
    }

    fn write_key<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(BACK_INDEX_PREFIX);
        buf.put_slice(self.doc_id.as_bytes());
    }

    fn write_value<B: BufMut>(&self, buf: &mut B) {
        VByteEncoder::encode_u64(buf, self.term_entries.len() as u64);
        for entry in &self.term_entries {
            VByteEncoder::encode_u64(buf, entry.term.len() as u64);
            buf.put_slice(entry.term.as_bytes());
            VByteEncoder::encode_u64(buf, entry.field as u64);
        }
        VByteEncoder::encode_u64(buf, self.stored_entries.len() as u64);
        for entry in &self.stored_entries {
            VByteEncoder::encode_u64(buf, entry.field as u64);
            VByteEncoder::encode_u64(buf, entry.array_positions.len() as u64);
            for &p in &entry.array_positions {
                VByteEncoder::encode_u64(buf, p);
            }
        }
    }
}
