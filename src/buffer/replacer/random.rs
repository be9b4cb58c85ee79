//! Random replacement policy.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::PageId;

use super::ReplacementPolicy;

/// Evicts a uniformly random unpinned page.
///
/// Members live in a dense vector; removal swaps the last element into the
/// vacated position so every operation stays O(1). The index map tracks each
/// member's position.
#[derive(Debug)]
pub struct RandomReplacer {
    members: Vec<PageId>,
    index: HashMap<PageId, usize>,
    rng: StdRng,
}

impl RandomReplacer {
    /// Create a replacer seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a replacer with a fixed seed, for reproducible eviction order.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            members: Vec::new(),
            index: HashMap::new(),
            rng,
        }
    }

    fn remove_at(&mut self, pos: usize) -> PageId {
        let page_id = self.members.swap_remove(pos);
        self.index.remove(&page_id);
        if let Some(&moved) = self.members.get(pos) {
            self.index.insert(moved, pos);
        }
        page_id
    }
}

impl Default for RandomReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for RandomReplacer {
    fn add(&mut self, page_id: PageId) {
        if self.index.contains_key(&page_id) {
            return;
        }
        self.index.insert(page_id, self.members.len());
        self.members.push(page_id);
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(&pos) = self.index.get(&page_id) {
            self.remove_at(pos);
        }
    }

    fn evict(&mut self) -> Option<PageId> {
        if self.members.is_empty() {
            return None;
        }
        let pos = self.rng.gen_range(0..self.members.len());
        Some(self.remove_at(pos))
    }

    fn contains(&self, page_id: PageId) -> bool {
        self.index.contains_key(&page_id)
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pid(n: u64) -> PageId {
        PageId::new(n)
    }

    #[test]
    fn test_random_evicts_every_member_once() {
        let mut replacer = RandomReplacer::with_seed(42);
        for n in 0..50 {
            replacer.add(pid(n));
        }

        let mut seen = HashSet::new();
        while let Some(victim) = replacer.evict() {
            assert!(seen.insert(victim), "{} evicted twice", victim);
        }
        assert_eq!(seen.len(), 50);
        assert!(replacer.is_empty());
    }

    #[test]
    fn test_random_remove_keeps_index_consistent() {
        let mut replacer = RandomReplacer::with_seed(1);
        for n in 0..10 {
            replacer.add(pid(n));
        }

        replacer.remove(pid(0)); // swaps the last member into position 0
        replacer.remove(pid(9)); // already moved
        replacer.remove(pid(5));
        replacer.remove(pid(99)); // absent

        assert_eq!(replacer.len(), 7);
        for n in [1, 2, 3, 4, 6, 7, 8] {
            assert!(replacer.contains(pid(n)));
            assert_eq!(replacer.members[replacer.index[&pid(n)]], pid(n));
        }
        assert!(!replacer.contains(pid(0)));
        assert!(!replacer.contains(pid(9)));
    }

    #[test]
    fn test_random_never_evicts_removed_page() {
        let mut replacer = RandomReplacer::with_seed(7);
        replacer.add(pid(1));
        replacer.add(pid(2));
        replacer.remove(pid(1));

        assert_eq!(replacer.evict(), Some(pid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_random_same_seed_same_order() {
        let order = |seed| {
            let mut replacer = RandomReplacer::with_seed(seed);
            for n in 0..20 {
                replacer.add(pid(n));
            }
            std::iter::from_fn(|| replacer.evict()).collect::<Vec<_>>()
        };

        assert_eq!(order(3), order(3));
    }

    #[test]
    fn test_random_duplicate_add_ignored() {
        let mut replacer = RandomReplacer::with_seed(0);
        replacer.add(pid(4));
        replacer.add(pid(4));
        assert_eq!(replacer.len(), 1);
    }
}
