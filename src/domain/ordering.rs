//! Stable fill ordering for deterministic processing.

use crate::domain::Fill;

/// Stable ordering key for fills.
///
/// Ordering: timestamp -> block_number -> log_index -> tx_hash
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillOrderingKey {
    pub time_ms: i64,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: String,
}

impl FillOrderingKey {
    pub fn from_fill(fill: &Fill) -> Self {
        FillOrderingKey {
            time_ms: fill.timestamp.as_ms(),
            block_number: fill.block_number,
            log_index: fill.key.log_index,
            tx_hash: fill.key.tx_hash.clone(),
        }
    }

    /// Returns true if fill_a should come before fill_b.
    pub fn should_come_before(fill_a: &Fill, fill_b: &Fill) -> bool {
        Self::from_fill(fill_a) < Self::from_fill(fill_b)
    }
}

/// Sort fills deterministically.
pub fn sort_fills_deterministic(fills: &mut [Fill]) {
    fills.sort_by_cached_key(FillOrderingKey::from_fill);
}
