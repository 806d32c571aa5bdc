use std::sync::Arc;
use crate::core::error::Result;
use crate::index::back_index::RowDiff;
use crate::index::rows::{Row, RowCodec, TermFrequencyRow};
use crate::memory::buffer_pool::BufferPool;
use crate::storage::kvstore::KVBatch;

/// Turns a row diff into one KV batch.
///
/// Adds and updates become sets, deletes become key deletions. Every
/// TermFrequency add merges +1 into its dictionary counter and every
/// TermFrequency delete merges -1.
pub struct BatchWriter {
    pool: Arc<BufferPool>,
}

impl BatchWriter {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        BatchWriter { pool }
    }

    pub fn build(&self, diff: &RowDiff) -> Result<KVBatch> {
        let mut batch = KVBatch::with_arena(self.pool.get(Self::arena_size(diff)));

        for row in &diff.add {
            Self::set(&mut batch, row)?;
            if let Row::TermFrequency(tf) = row {
                batch.merge(&tf.dictionary_key(), 1);
            }
        }
        for row in &diff.update {
            Self::set(&mut batch, row)?;
        }
        for row in &diff.delete {
            batch.delete_with(row.key_size(), |key| row.key_to(key).map(|_| ()))?;
            if let Row::TermFrequency(tf) = row {
                batch.merge(&tf.dictionary_key(), -1);
            }
        }

        Ok(batch)
    }

    /// Hand the batch's arena back to the pool once it has been executed
    pub fn recycle(&self, batch: KVBatch) {
        self.pool.return_buffer(batch.into_arena());
    }

    fn set(batch: &mut KVBatch, row: &Row) -> Result<()> {
        batch.set_with(row.key_size(), row.value_size(), |key, value| {
            row.key_to(key)?;
            row.value_to(value)?;
            Ok(())
        })
    }

    /// Exact arena bytes `build` will use
    fn arena_size(diff: &RowDiff) -> usize {
        let dictionary_key = |tf: &TermFrequencyRow| 1 + tf.term.len() + 1 + 2;

        let mut size = 0;
        for row in diff.add.iter().chain(diff.update.iter()) {
            size += row.key_size() + row.value_size();
        }
        for row in &diff.delete {
            size += row.key_size();
        }
        for row in diff.add.iter().chain(diff.delete.iter()) {
            if let Row::TermFrequency(tf) = row {
                size += dictionary_key(tf);
            }
        }
        size
    }
}
