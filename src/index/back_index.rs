//! Loading a document's back index and diffing it against fresh analysis.

use std::collections::{BTreeMap, HashMap};
use crate::core::error::Result;
use crate::index::rows::{
    BackIndexRow, BackIndexStoreEntry, BackIndexTermEntry, Row, RowCodec,
};
use crate::storage::kvstore::KVReader;

/// `None` when the document has never been indexed
pub fn load_back_index(reader: &dyn KVReader, doc_id: &str) -> Result<Option<BackIndexRow>> {
    let key = BackIndexRow::key_only(doc_id).key();
    match reader.get(&key)? {
        Some(value) => Ok(Some(
            BackIndexRow::from_kv(&key, &value).map_err(|e| e.wrap("loading back index"))?,
        )),
        None => Ok(None),
    }
}

/// Rows to write for one document mutation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RowDiff {
    pub add: Vec<Row>,
    pub update: Vec<Row>,
    pub delete: Vec<Row>,
}

impl RowDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn extend(&mut self, other: RowDiff) {
        self.add.extend(other.add);
        self.update.extend(other.update);
        self.delete.extend(other.delete);
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.update.len() + self.delete.len()
    }
}

#[derive(Clone, Copy)]
enum Class {
    Add,
    Update,
}

/// Classify freshly analyzed rows against the previous back index.
///
/// Rows whose key was live before become updates, the rest are adds, and
/// every old key not produced again is deleted. The new back index row is
/// derived from `new_rows` and replaces the old one. Rows other than
/// TermFrequency/Stored are written as plain updates.
pub fn diff(doc_id: &str, old: Option<&BackIndexRow>, new_rows: Vec<Row>) -> RowDiff {
    let mut old_keys: BTreeMap<Vec<u8>, Row> = BTreeMap::new();
    if let Some(old) = old {
        for row in old.term_frequency_rows() {
            old_keys.insert(row.key(), Row::TermFrequency(row));
        }
        for row in old.stored_rows() {
            old_keys.insert(row.key(), Row::Stored(row));
        }
    }

    let mut out = RowDiff::default();
    let mut seen: HashMap<Vec<u8>, (Class, usize)> = HashMap::new();
    let mut term_entries = Vec::new();
    let mut stored_entries = Vec::new();

    for row in new_rows {
        let tracked = match &row {
            Row::TermFrequency(tf) => {
                term_entries.push(BackIndexTermEntry { term: tf.term.clone(), field: tf.field });
                true
            }
            Row::Stored(stored) => {
                stored_entries.push(BackIndexStoreEntry {
                    field: stored.field,
                    array_positions: stored.array_positions.clone(),
                });
                true
            }
            _ => false,
        };

        let key = row.key();
        if let Some(&(class, idx)) = seen.get(&key) {
            // Same key twice: last one wins, classification unchanged
            match class {
                Class::Add => out.add[idx] = row,
                Class::Update => out.update[idx] = row,
            }
            continue;
        }

        let class = if !tracked || old_keys.remove(&key).is_some() {
            out.update.push(row);
            (Class::Update, out.update.len() - 1)
        } else {
            out.add.push(row);
            (Class::Add, out.add.len() - 1)
        };
        seen.insert(key, class);
    }

    out.delete.extend(old_keys.into_values());

    term_entries.sort();
    term_entries.dedup();
    stored_entries.sort();
    stored_entries.dedup();
    let back_index = Row::BackIndex(BackIndexRow::new(doc_id, term_entries, stored_entries));
    if old.is_some() {
        out.update.push(back_index);
    } else {
        out.add.push(back_index);
    }

    out
}

/// Every row of a document plus its back index, as deletions
pub fn deletion(old: &BackIndexRow) -> RowDiff {
    let mut delete: Vec<Row> = old.term_frequency_rows().map(Row::TermFrequency).collect();
    delete.extend(old.stored_rows().map(Row::Stored));
    delete.push(Row::BackIndex(BackIndexRow::key_only(old.doc_id.as_str())));
    RowDiff { add: Vec::new(), update: Vec::new(), delete }
}
