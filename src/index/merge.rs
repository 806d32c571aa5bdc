use std::sync::Arc;
use tracing::warn;
use crate::core::error::Result;
use crate::core::stats::IndexStats;
use crate::index::rows::DictionaryRow;
use crate::storage::kvstore::MergeOperator;

/// Applies signed deltas to varint dictionary counters.
///
/// A counter never goes below zero. An underflow means a posting was deleted
/// twice; it is clamped, logged and counted in the attached stats.
#[derive(Default)]
pub struct DictionaryCounterMerge {
    stats: Option<Arc<IndexStats>>,
}

impl DictionaryCounterMerge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(stats: Arc<IndexStats>) -> Self {
        DictionaryCounterMerge { stats: Some(stats) }
    }
}

impl MergeOperator for DictionaryCounterMerge {
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, deltas: &[i64]) -> Result<Vec<u8>> {
        let mut count = match existing {
            Some(value) => DictionaryRow::decode_count(value)? as i128,
            None => 0,
        };
        for &delta in deltas {
            count += delta as i128;
        }

        let clamped = if count < 0 {
            warn!(
                key = %String::from_utf8_lossy(key),
                count = count as i64,
                "dictionary counter underflow, clamping to zero"
            );
            if let Some(stats) = &self.stats {
                stats.record_counter_underflow();
            }
            0
        } else {
            u64::try_from(count).unwrap_or(u64::MAX)
        };

        Ok(DictionaryRow::encode_count(clamped))
    }

    fn name(&self) -> &str {
        "dictionary_counter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(existing: Option<u64>, deltas: &[i64]) -> u64 {
        let existing = existing.map(DictionaryRow::encode_count);
        let out = DictionaryCounterMerge::new()
            .full_merge(b"dcat\xff\x00\x01", existing.as_deref(), deltas)
            .unwrap();
        DictionaryRow::decode_count(&out).unwrap()
    }

    #[test]
    fn deltas_accumulate() {
        assert_eq!(merge(None, &[1]), 1);
        assert_eq!(merge(Some(5), &[1, 1, -1]), 6);
        assert_eq!(merge(Some(300), &[-300]), 0);
    }

    #[test]
    fn underflow_clamps_at_zero() {
        assert_eq!(merge(Some(1), &[-1, -1]), 0);
        assert_eq!(merge(None, &[-1]), 0);
    }

    #[test]
    fn underflows_are_counted() {
        let stats = Arc::new(IndexStats::new());
        let merge = DictionaryCounterMerge::with_stats(stats.clone());
        let one = DictionaryRow::encode_count(1);
        merge.full_merge(b"dcat\xff\x00\x01", Some(&one), &[-1]).unwrap();
        assert_eq!(stats.snapshot().counter_underflows, 0);

        let out = merge.full_merge(b"dcat\xff\x00\x01", Some(&one), &[-2]).unwrap();
        assert_eq!(DictionaryRow::decode_count(&out).unwrap(), 0);
        assert_eq!(stats.snapshot().counter_underflows, 1);
    }

    #[test]
    fn corrupt_existing_value_fails() {
        let err = DictionaryCounterMerge::new().full_merge(b"d", Some(&[0x80]), &[1]).unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Corrupt);
    }
}
