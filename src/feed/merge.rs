use crate::events::RollEvent;
use std::collections::HashSet;

/// Merge a freshly decoded batch into `existing`, returning a new list.
///
/// Records whose transaction hash is already known (in `existing` or earlier
/// in `incoming`) are dropped; the result is ordered newest block first. The
/// sort is stable, so re-merging an already merged batch is a no-op.
pub fn merge(existing: &[RollEvent], incoming: &[RollEvent]) -> Vec<RollEvent> {
    let mut seen: HashSet<&str> = existing.iter().map(|e| e.tx_hash.as_str()).collect();
    let mut merged: Vec<RollEvent> = incoming
        .iter()
        .filter(|e| seen.insert(e.tx_hash.as_str()))
        .cloned()
        .collect();
    merged.extend_from_slice(existing);
    merged.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    merged
}

/// The cursor never moves backwards; an empty batch leaves it where it was.
pub fn advance_cursor(previous: Option<u64>, raw_max_block: Option<u64>) -> Option<u64> {
    previous.max(raw_max_block)
}
