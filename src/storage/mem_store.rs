use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::{Mutex, MutexGuard, RwLock};
use crate::core::error::{Error, Result};
use crate::index::rows::increment_bytes;
use crate::storage::kvstore::{
    apply_resolved, resolve_batch, KVBatch, KVIterator, KVReader, KVStore, KVWriter,
    MergeOperator, ResolvedOp,
};

pub const NAME: &str = "mem";

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

struct MemShared {
    data: RwLock<Arc<Map>>,
    write_lock: Mutex<()>,     // Serializes batch resolution + apply
    merge: Arc<dyn MergeOperator>,
    closed: AtomicBool,
}

/// Ordered in-memory store with snapshot readers.
///
/// Readers hold an `Arc` to the map they started on. A batch mutates the map in
/// place when no snapshot is outstanding and copies it first otherwise.
#[derive(Clone)]
pub struct MemStore {
    shared: Arc<MemShared>,
}

impl MemStore {
    pub fn new(merge: Arc<dyn MergeOperator>) -> Self {
        Self::with_data(Map::new(), merge)
    }

    pub(crate) fn with_data(data: Map, merge: Arc<dyn MergeOperator>) -> Self {
        MemStore {
            shared: Arc::new(MemShared {
                data: RwLock::new(Arc::new(data)),
                write_lock: Mutex::new(()),
                merge,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<Map> {
        self.shared.data.read().clone()
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.shared.write_lock.lock()
    }

    pub(crate) fn resolve(&self, batch: &KVBatch) -> Result<Vec<ResolvedOp>> {
        let snapshot = self.snapshot();
        resolve_batch(&snapshot, batch, self.shared.merge.as_ref())
    }

    /// Caller must hold `lock_writes`
    pub(crate) fn apply(&self, ops: Vec<ResolvedOp>) {
        let mut data = self.shared.data.write();
        apply_resolved(Arc::make_mut(&mut data), ops);
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::invalid_state("store is closed"));
        }
        Ok(())
    }

    pub(crate) fn mark_closed(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KVStore for MemStore {
    fn reader(&self) -> Result<Box<dyn KVReader>> {
        self.ensure_open()?;
        Ok(Box::new(MemReader { data: self.snapshot() }))
    }

    fn writer(&self) -> Result<Box<dyn KVWriter>> {
        self.ensure_open()?;
        Ok(Box::new(MemWriter { store: self.clone() }))
    }

    fn close(&self) -> Result<()> {
        self.mark_closed();
        Ok(())
    }

    fn name(&self) -> &str {
        NAME
    }
}

pub struct MemWriter {
    store: MemStore,
}

impl KVWriter for MemWriter {
    fn execute_batch(&mut self, batch: &KVBatch) -> Result<()> {
        self.store.ensure_open()?;
        let _guard = self.store.lock_writes();
        let ops = self.store.resolve(batch)?;
        self.store.apply(ops);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Snapshot of the map taken when the reader was opened
pub struct MemReader {
    data: Arc<Map>,
}

impl MemReader {
    pub(crate) fn new(data: Arc<Map>) -> Self {
        MemReader { data }
    }
}

impl KVReader for MemReader {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn prefix_iterator<'a>(&'a self, prefix: &[u8]) -> Box<dyn KVIterator + 'a> {
        let end = increment_bytes(prefix);
        Box::new(MemIterator::new(&self.data, prefix.to_vec(), end))
    }

    fn range_iterator<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> Box<dyn KVIterator + 'a> {
        Box::new(MemIterator::new(&self.data, start.to_vec(), end.map(|e| e.to_vec())))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

pub struct MemIterator<'a> {
    data: &'a Map,
    start: Vec<u8>,
    end: Option<Vec<u8>>,
    range: btree_map::Range<'a, Vec<u8>, Vec<u8>>,
    current: Option<(&'a [u8], &'a [u8])>,
}

impl<'a> MemIterator<'a> {
    fn new(data: &'a Map, start: Vec<u8>, end: Option<Vec<u8>>) -> Self {
        let range = Self::range_from(data, &start, end.as_deref());
        let mut iter = MemIterator {
            data,
            start,
            end,
            range,
            current: None,
        };
        iter.next();
        iter
    }

    fn range_from(data: &'a Map, from: &[u8], end: Option<&[u8]>) -> btree_map::Range<'a, Vec<u8>, Vec<u8>> {
        match end {
            // BTreeMap::range panics on an inverted range
            Some(end) if end <= from => data.range::<[u8], _>((Bound::Included(end), Bound::Excluded(end))),
            Some(end) => data.range::<[u8], _>((Bound::Included(from), Bound::Excluded(end))),
            None => data.range::<[u8], _>((Bound::Included(from), Bound::Unbounded)),
        }
    }
}

impl<'a> KVIterator for MemIterator<'a> {
    fn seek(&mut self, key: &[u8]) {
        let from = if key < self.start.as_slice() { self.start.as_slice() } else { key };
        self.range = Self::range_from(self.data, from, self.end.as_deref());
        self.next();
    }

    fn next(&mut self) {
        self.current = self.range.next().map(|(k, v)| (k.as_slice(), v.as_slice()));
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kvstore::tests::SumMerge;

    fn store() -> MemStore {
        MemStore::new(Arc::new(SumMerge))
    }

    fn write(store: &MemStore, pairs: &[(&str, &str)]) {
        let mut writer = store.writer().unwrap();
        let mut batch = writer.new_batch();
        for (k, v) in pairs {
            batch.set(k.as_bytes(), v.as_bytes());
        }
        writer.execute_batch(&batch).unwrap();
        writer.close().unwrap();
    }

    fn collect(mut iter: Box<dyn KVIterator + '_>) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        while let Some((k, _)) = iter.current() {
            keys.push(k.to_vec());
            iter.next();
        }
        keys
    }

    #[test]
    fn readers_are_isolated_from_later_batches() {
        let store = store();
        write(&store, &[("a", "1")]);
        let before = store.reader().unwrap();
        write(&store, &[("a", "2"), ("b", "3")]);

        assert_eq!(before.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(before.get(b"b").unwrap(), None);
        let after = store.reader().unwrap();
        assert_eq!(after.get(b"a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn prefix_and_range_scans_are_half_open() {
        let store = store();
        write(&store, &[("ta", ""), ("tb", ""), ("tc", ""), ("u", "")]);
        let mut writer = store.writer().unwrap();
        let mut batch = KVBatch::new();
        batch.set(b"tb\xff", b"");
        writer.execute_batch(&batch).unwrap();
        let reader = store.reader().unwrap();

        assert_eq!(collect(reader.prefix_iterator(b"tb")), vec![b"tb".to_vec(), b"tb\xff".to_vec()]);
        assert_eq!(collect(reader.range_iterator(b"ta", Some(b"tc"))).len(), 3);
        assert_eq!(collect(reader.range_iterator(b"tc", None)).len(), 2);
        assert!(collect(reader.range_iterator(b"tc", Some(b"ta"))).is_empty());
    }

    #[test]
    fn seek_stays_within_bounds() {
        let store = store();
        write(&store, &[("a", ""), ("b", ""), ("c", ""), ("d", "")]);
        let reader = store.reader().unwrap();
        let mut iter = reader.range_iterator(b"b", Some(b"d"));

        iter.seek(b"a");
        assert_eq!(iter.current().unwrap().0, b"b");
        iter.seek(b"c");
        assert_eq!(iter.current().unwrap().0, b"c");
        iter.seek(b"d");
        assert!(!iter.valid());
    }

    #[test]
    fn merge_applies_through_operator() {
        let store = store();
        let mut writer = store.writer().unwrap();
        let mut batch = KVBatch::new();
        batch.merge(b"n", 2);
        batch.merge(b"n", 3);
        writer.execute_batch(&batch).unwrap();

        let value = store.reader().unwrap().get(b"n").unwrap().unwrap();
        assert_eq!(i64::from_le_bytes(value.try_into().unwrap()), 5);
    }

    #[test]
    fn closed_store_rejects_handles() {
        let store = store();
        store.close().unwrap();
        assert!(store.reader().is_err());
        assert!(store.writer().is_err());
    }
}
