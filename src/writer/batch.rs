use std::collections::HashMap;
use crate::core::types::{DocId, Document};

/// Set of document and internal operations applied together by `Index::batch`.
///
/// A document maps to `Some` for an update and `None` for a delete; the last
/// operation recorded for an id wins.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    pub(crate) index_ops: HashMap<DocId, Option<Document>>,
    pub(crate) internal_ops: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Batch {
    pub fn new() -> Self {
        Batch::default()
    }

    pub fn update(&mut self, doc: Document) {
        self.index_ops.insert(doc.id.clone(), Some(doc));
    }

    pub fn delete(&mut self, id: impl Into<DocId>) {
        self.index_ops.insert(id.into(), None);
    }

    pub fn set_internal(&mut self, key: &[u8], value: &[u8]) {
        self.internal_ops.insert(key.to_vec(), Some(value.to_vec()));
    }

    pub fn delete_internal(&mut self, key: &[u8]) {
        self.internal_ops.insert(key.to_vec(), None);
    }

    /// Number of document operations
    pub fn len(&self) -> usize {
        self.index_ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_ops.is_empty() && self.internal_ops.is_empty()
    }

    pub fn reset(&mut self) {
        self.index_ops.clear();
        self.internal_ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_operation_per_id_wins() {
        let mut batch = Batch::new();
        batch.update(Document::new("a").with_text("body", "x"));
        batch.delete("a");
        batch.update(Document::new("b"));
        assert_eq!(batch.len(), 2);
        assert!(batch.index_ops[&DocId::new("a")].is_none());

        batch.set_internal(b"k", b"v");
        batch.reset();
        assert!(batch.is_empty());
    }
}
