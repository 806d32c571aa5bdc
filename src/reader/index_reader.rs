use std::collections::BTreeMap;
use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::core::types::{Document, Field};
use crate::index::back_index::load_back_index;
use crate::index::field_catalog::FieldCatalog;
use crate::index::rows::{
    increment_bytes, DictionaryRow, InternalRow, RowCodec, StoredRow, TermFrequencyRow,
    BACK_INDEX_PREFIX, DICTIONARY_PREFIX,
};
use crate::storage::kvstore::KVReader;

/// One term of a field dictionary with its live posting count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub term: String,
    pub count: u64,
}

/// Postings of one (term, field) pair, ordered by document id
#[derive(Debug, Clone)]
pub struct TermFieldReader {
    count: u64,
    postings: Vec<TermFrequencyRow>,
    next: usize,
}

impl TermFieldReader {
    /// Dictionary counter for the pair
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn next(&mut self) -> Option<&TermFrequencyRow> {
        let row = self.postings.get(self.next)?;
        self.next += 1;
        Some(row)
    }

    /// Skip to the first posting whose document id is >= `doc_id`
    pub fn advance(&mut self, doc_id: &str) -> Option<&TermFrequencyRow> {
        let skip = self.postings[self.next..].partition_point(|p| p.doc_id.as_str() < doc_id);
        self.next += skip;
        self.next()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Point-in-time view of the index.
///
/// Wraps a KV snapshot taken together with the document count, so neither
/// moves while the reader is alive.
pub struct IndexReader {
    kv: Box<dyn KVReader>,
    doc_count: u64,
    fields: Arc<FieldCatalog>,
}

impl IndexReader {
    pub(crate) fn new(kv: Box<dyn KVReader>, doc_count: u64, fields: Arc<FieldCatalog>) -> Self {
        IndexReader { kv, doc_count, fields }
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    pub fn term_field_reader(&self, term: &str, field: &str) -> Result<TermFieldReader> {
        let Some((field_id, _)) = self.fields.field_id(field, false)? else {
            return Ok(TermFieldReader { count: 0, postings: Vec::new(), next: 0 });
        };

        let dictionary_key = DictionaryRow::new(term, field_id, 0).key();
        let count = match self.kv.get(&dictionary_key)? {
            Some(value) => DictionaryRow::decode_count(&value)?,
            None => 0,
        };

        let prefix = TermFrequencyRow::posting_prefix(term, field_id);
        let mut postings = Vec::new();
        let mut iter = self.kv.prefix_iterator(&prefix);
        while let Some((key, value)) = iter.current() {
            postings.push(TermFrequencyRow::from_kv(key, value)?);
            iter.next();
        }

        Ok(TermFieldReader { count, postings, next: 0 })
    }

    /// Every term of `field` with a non-zero count
    pub fn field_dict(&self, field: &str) -> Result<Vec<DictEntry>> {
        self.field_dict_range(field, &[DICTIONARY_PREFIX], None)
    }

    pub fn field_dict_prefix(&self, field: &str, prefix: &str) -> Result<Vec<DictEntry>> {
        let mut start = vec![DICTIONARY_PREFIX];
        start.extend_from_slice(prefix.as_bytes());
        let end = increment_bytes(&start);
        self.field_dict_range(field, &start, end.as_deref())
    }

    fn field_dict_range(&self, field: &str, start: &[u8], end: Option<&[u8]>) -> Result<Vec<DictEntry>> {
        let Some((field_id, _)) = self.fields.field_id(field, false)? else {
            return Ok(Vec::new());
        };
        // Dictionary rows are the only `d` rows; stop at the end of that prefix
        let prefix_end = increment_bytes(&[DICTIONARY_PREFIX]);
        let end = end.or(prefix_end.as_deref());

        let mut entries = Vec::new();
        let mut iter = self.kv.range_iterator(start, end);
        while let Some((key, value)) = iter.current() {
            let row = DictionaryRow::from_kv(key, value)?;
            if row.field == field_id && row.count > 0 {
                entries.push(DictEntry { term: row.term, count: row.count });
            }
            iter.next();
        }
        Ok(entries)
    }

    /// Ids of every indexed document, in key order
    pub fn doc_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut iter = self.kv.prefix_iterator(&[BACK_INDEX_PREFIX]);
        while let Some((key, _)) = iter.current() {
            let id = std::str::from_utf8(&key[1..])
                .map_err(|_| Error::corrupt("back index key is not valid UTF-8"))?;
            ids.push(id.to_string());
            iter.next();
        }
        Ok(ids)
    }

    /// Stored fields of a document; `None` if it is not indexed
    pub fn document(&self, doc_id: &str) -> Result<Option<Document>> {
        if load_back_index(self.kv.as_ref(), doc_id)?.is_none() {
            return Ok(None);
        }

        let mut doc = Document::new(doc_id);
        let prefix = StoredRow::document_prefix(doc_id);
        let mut iter = self.kv.prefix_iterator(&prefix);
        while let Some((key, value)) = iter.current() {
            let row = StoredRow::from_kv(key, value)?;
            let name = self.field_name(row.field)?;
            doc.add_field(Field::new(name, row.field_value()?).with_array_positions(row.array_positions));
            iter.next();
        }
        Ok(Some(doc))
    }

    /// Indexed terms of a document grouped by field name, read from its back index
    pub fn document_field_terms(&self, doc_id: &str) -> Result<Option<BTreeMap<String, Vec<String>>>> {
        let Some(back_index) = load_back_index(self.kv.as_ref(), doc_id)? else {
            return Ok(None);
        };

        let mut terms: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in back_index.term_entries {
            terms.entry(self.field_name(entry.field)?).or_default().push(entry.term);
        }
        Ok(Some(terms))
    }

    pub fn get_internal(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.kv.get(&InternalRow::key_for(key))
    }

    pub fn fields(&self) -> Vec<(u16, String)> {
        self.fields.fields()
    }

    /// Raw access to the snapshot for callers that decode rows themselves
    pub fn kv(&self) -> &dyn KVReader {
        self.kv.as_ref()
    }

    pub fn close(self) -> Result<()> {
        self.kv.close()
    }

    fn field_name(&self, id: u16) -> Result<String> {
        self.fields
            .field_name(id)
            .ok_or_else(|| Error::corrupt(format!("row references unknown field id {}", id)))
    }
}
