use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use serde::{Serialize, Deserialize};
use crate::core::error::Result;

/// Associative update applied by the store in place of an overwrite
pub trait MergeOperator: Send + Sync {
    /// Fold `deltas` into `existing`, returning the new stored value
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, deltas: &[i64]) -> Result<Vec<u8>>;

    fn name(&self) -> &str;
}

/// Ordered key-value store the index is layered on
pub trait KVStore: Send + Sync {
    /// Point-in-time snapshot; never observes a partially applied batch
    fn reader(&self) -> Result<Box<dyn KVReader>>;

    fn writer(&self) -> Result<Box<dyn KVWriter>>;

    fn close(&self) -> Result<()>;

    fn name(&self) -> &str;
}

pub trait KVReader: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn prefix_iterator<'a>(&'a self, prefix: &[u8]) -> Box<dyn KVIterator + 'a>;

    /// Keys in `[start, end)`; `end == None` scans to the last key
    fn range_iterator<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> Box<dyn KVIterator + 'a>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Cursor over a key range
pub trait KVIterator {
    /// Position on the first key >= `key` inside the iterator's bounds
    fn seek(&mut self, key: &[u8]);

    fn next(&mut self);

    fn current(&self) -> Option<(&[u8], &[u8])>;

    fn valid(&self) -> bool {
        self.current().is_some()
    }
}

pub trait KVWriter: Send {
    fn new_batch(&self) -> KVBatch {
        KVBatch::new()
    }

    /// Apply every operation of `batch` atomically
    fn execute_batch(&mut self, batch: &KVBatch) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Set,
    Delete,
    Merge(i64),
}

#[derive(Debug, Clone)]
struct BatchOp {
    kind: OpKind,
    key: Range<usize>,
    value: Range<usize>,
}

/// Borrowed view of one batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEntry<'a> {
    Set(&'a [u8], &'a [u8]),
    Delete(&'a [u8]),
    Merge(&'a [u8], i64),
}

/// Write batch whose keys and values live in one contiguous arena
#[derive(Debug, Default)]
pub struct KVBatch {
    arena: Vec<u8>,
    ops: Vec<BatchOp>,
}

impl KVBatch {
    pub fn new() -> Self {
        KVBatch::default()
    }

    /// Build on a (possibly pooled) arena buffer
    pub fn with_arena(mut arena: Vec<u8>) -> Self {
        arena.clear();
        KVBatch { arena, ops: Vec::new() }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let key = self.push_bytes(key);
        let value = self.push_bytes(value);
        self.ops.push(BatchOp { kind: OpKind::Set, key, value });
    }

    pub fn delete(&mut self, key: &[u8]) {
        let key = self.push_bytes(key);
        self.ops.push(BatchOp { kind: OpKind::Delete, key, value: 0..0 });
    }

    pub fn merge(&mut self, key: &[u8], delta: i64) {
        let key = self.push_bytes(key);
        self.ops.push(BatchOp { kind: OpKind::Merge(delta), key, value: 0..0 });
    }

    /// Reserve `key_len + value_len` arena bytes and let `fill` serialize into them
    pub fn set_with<F>(&mut self, key_len: usize, value_len: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8], &mut [u8]) -> Result<()>,
    {
        let start = self.arena.len();
        self.arena.resize(start + key_len + value_len, 0);
        let (key_buf, value_buf) = self.arena[start..].split_at_mut(key_len);
        if let Err(e) = fill(key_buf, value_buf) {
            self.arena.truncate(start);
            return Err(e);
        }
        self.ops.push(BatchOp {
            kind: OpKind::Set,
            key: start..start + key_len,
            value: start + key_len..start + key_len + value_len,
        });
        Ok(())
    }

    pub fn delete_with<F>(&mut self, key_len: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        let start = self.arena.len();
        self.arena.resize(start + key_len, 0);
        if let Err(e) = fill(&mut self.arena[start..]) {
            self.arena.truncate(start);
            return Err(e);
        }
        self.ops.push(BatchOp { kind: OpKind::Delete, key: start..start + key_len, value: 0..0 });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = BatchEntry<'_>> + '_ {
        self.ops.iter().map(move |op| {
            let key = &self.arena[op.key.clone()];
            match op.kind {
                OpKind::Set => BatchEntry::Set(key, &self.arena[op.value.clone()]),
                OpKind::Delete => BatchEntry::Delete(key),
                OpKind::Merge(delta) => BatchEntry::Merge(key, delta),
            }
        })
    }

    pub fn reset(&mut self) {
        self.arena.clear();
        self.ops.clear();
    }

    /// Hand the arena back for pooling
    pub fn into_arena(self) -> Vec<u8> {
        self.arena
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Range<usize> {
        let start = self.arena.len();
        self.arena.extend_from_slice(bytes);
        start..self.arena.len()
    }
}

/// Batch operation with merges already folded into plain writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedOp {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Fold a batch against `current` into plain sets/deletes.
///
/// Nothing is applied here, so a failing merge leaves the store untouched.
/// Later operations on the same key see the effect of earlier ones.
pub fn resolve_batch(
    current: &BTreeMap<Vec<u8>, Vec<u8>>,
    batch: &KVBatch,
    merge: &dyn MergeOperator,
) -> Result<Vec<ResolvedOp>> {
    let mut overlay: HashMap<&[u8], Option<Vec<u8>>> = HashMap::new();
    let mut resolved = Vec::with_capacity(batch.len());

    for entry in batch.entries() {
        match entry {
            BatchEntry::Set(key, value) => {
                overlay.insert(key, Some(value.to_vec()));
                resolved.push(ResolvedOp::Set(key.to_vec(), value.to_vec()));
            }
            BatchEntry::Delete(key) => {
                overlay.insert(key, None);
                resolved.push(ResolvedOp::Delete(key.to_vec()));
            }
            BatchEntry::Merge(key, delta) => {
                let existing = match overlay.get(key) {
                    Some(pending) => pending.as_deref(),
                    None => current.get(key).map(|v| v.as_slice()),
                };
                let merged = merge.full_merge(key, existing, &[delta])?;
                overlay.insert(key, Some(merged.clone()));
                resolved.push(ResolvedOp::Set(key.to_vec(), merged));
            }
        }
    }

    Ok(resolved)
}

pub fn apply_resolved(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: Vec<ResolvedOp>) {
    for op in ops {
        match op {
            ResolvedOp::Set(key, value) => {
                map.insert(key, value);
            }
            ResolvedOp::Delete(key) => {
                map.remove(&key);
            }
        }
    }
}
