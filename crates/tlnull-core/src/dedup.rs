//! Structural deduplication of draw batches.

use std::collections::HashSet;

/// Keep the structurally distinct draws of a batch, in first-seen order.
///
/// Two draws are the same when their canonical (descending) sequences are
/// equal element-wise. The result can be shorter than the input.
pub fn deduplicate(batch: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
    let mut seen: HashSet<Vec<u64>> = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|draw| seen.insert(draw.clone()))
        .collect()
}
