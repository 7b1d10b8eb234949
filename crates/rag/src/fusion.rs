//! Reciprocal Rank Fusion
//!
//! Each candidate scores `sum(1 / (k + rank))` over the lists it appears
//! in, with 1-based ranks. Candidates with equal fused scores keep the
//! order in which they were first seen (list order, then position).

use std::collections::HashMap;
use std::hash::Hash;

/// Fuse ranked lists of keys, returning at most `limit` `(key, score)` pairs
/// best first
pub fn reciprocal_rank_fusion<K>(lists: &[Vec<K>], k: f32, limit: usize) -> Vec<(K, f32)>
where
    K: Eq + Hash + Clone,
{
    let mut slots: HashMap<&K, usize> = HashMap::new();
    let mut fused: Vec<(K, f32)> = Vec::new();

    for list in lists {
        for (position, key) in list.iter().enumerate() {
            let contribution = 1.0 / (k + position as f32 + 1.0);

            match slots.get(key) {
                Some(&slot) => fused[slot].1 += contribution,
                None => {
                    slots.insert(key, fused.len());
                    fused.push((key.clone(), contribution));
                },
            }
        }
    }

    // Stable: ties stay in first-seen order
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused.truncate(limit);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_list_keeps_order() {
        let fused = reciprocal_rank_fusion(&[vec!["a", "b", "c"]], 60.0, 10);
        let keys: Vec<_> = fused.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_shared_candidates_rise() {
        let dense = vec!["x", "y", "z"];
        let sparse = vec!["z", "w", "y"];
        let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0, 10);

        // y: 1/62 + 1/63, z: 1/63 + 1/61 -> z first, then y
        assert_eq!(fused[0].0, "z");
        assert_eq!(fused[1].0, "y");
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn test_ties_broken_by_first_seen() {
        // a and b swap ranks across lists: equal fused scores
        let fused = reciprocal_rank_fusion(&[vec!["a", "b"], vec!["b", "a"]], 60.0, 10);
        assert_eq!(fused[0].0, "a");
        assert_eq!(fused[1].0, "b");
        assert_eq!(fused[0].1, fused[1].1);
    }

    #[test]
    fn test_limit_and_empty() {
        let fused = reciprocal_rank_fusion(&[vec![1, 2, 3, 4]], 60.0, 2);
        assert_eq!(fused.len(), 2);

        let empty: Vec<(u32, f32)> = reciprocal_rank_fusion(&[], 60.0, 5);
        assert!(empty.is_empty());
    }
}
