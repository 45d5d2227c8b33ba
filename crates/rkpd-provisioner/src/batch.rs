/// Split `needed` keys into CSR batches of at most `batch_size`, remainder
/// last. A zero batch size yields no batches.
pub fn chunk_sizes(needed: usize, batch_size: usize) -> Vec<usize> {
    if batch_size == 0 {
        return Vec::new();
    }
    let mut chunks = vec![batch_size; needed / batch_size];
    if needed % batch_size != 0 {
        chunks.push(needed % batch_size);
    }
    chunks
}

/// Keys still missing from the pool.
pub fn keys_needed(desired: usize, unassigned: usize) -> usize {
    desired.saturating_sub(unassigned)
}

/// Component batch size, capped by configuration when a cap is set.
pub fn effective_batch_size(reported: usize, cap: Option<usize>) -> usize {
    match cap {
        Some(cap) => reported.min(cap),
        None => reported,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_twenty_keys_in_batches_of_thirteen() {
        assert_eq!(chunk_sizes(20, 13), vec![13, 7]);
    }

    #[test]
    fn test_edge_cases() {
        assert!(chunk_sizes(0, 13).is_empty());
        assert_eq!(chunk_sizes(26, 13), vec![13, 13]);
        assert_eq!(chunk_sizes(1, 13), vec![1]);
        assert!(chunk_sizes(5, 0).is_empty());
        assert_eq!(keys_needed(6, 10), 0);
        assert_eq!(keys_needed(20, 3), 17);
        assert_eq!(effective_batch_size(20, Some(13)), 13);
        assert_eq!(effective_batch_size(5, Some(13)), 5);
        assert_eq!(effective_batch_size(5, None), 5);
    }

    proptest! {
        #[test]
        fn chunks_cover_exactly_what_is_needed(needed in 0usize..10_000, batch in 1usize..200) {
            let chunks = chunk_sizes(needed, batch);

            prop_assert_eq!(chunks.iter().sum::<usize>(), needed);
            prop_assert_eq!(chunks.len(), needed.div_ceil(batch));
            prop_assert!(chunks.iter().all(|&c| c > 0 && c <= batch));
            if let Some((last, full)) = chunks.split_last() {
                prop_assert!(full.iter().all(|&c| c == batch));
                prop_assert!(*last <= batch);
            }
        }
    }
}
