//! LRU (Least-Recently-Used) replacement policy.
//!
//! "Used" means "unpinned": the victim is the page whose pin count reached
//! zero the longest time ago.

use std::collections::HashMap;

use crate::common::PageId;

use super::ReplacementPolicy;

/// A node in the recency list.
#[derive(Debug)]
struct Node {
    page_id: PageId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU eviction policy.
///
/// Unpinned pages sit in a doubly-linked list ordered by the time they were
/// added (head = least recent). Links are slot indices into a slab instead
/// of pointers, and vacated slots are recycled through a free list. A map
/// from page id to slot gives O(1) `remove`.
///
/// # Example
/// ```
/// use pagepool::buffer::replacer::{LruReplacer, ReplacementPolicy};
/// use pagepool::PageId;
///
/// let mut lru = LruReplacer::new();
/// lru.add(PageId::new(1));
/// lru.add(PageId::new(2));
/// assert_eq!(lru.evict(), Some(PageId::new(1)));
/// ```
#[derive(Debug, Default)]
pub struct LruReplacer {
    slots: Vec<Option<Node>>,
    free_slots: Vec<usize>,
    index: HashMap<PageId, usize>,
    /// Least recently added.
    head: Option<usize>,
    /// Most recently added.
    tail: Option<usize>,
}

impl LruReplacer {
    /// Create an empty LRU replacer.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_slot(&mut self, node: Node) -> usize {
        match self.free_slots.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn push_back(&mut self, page_id: PageId) {
        let idx = self.alloc_slot(Node {
            page_id,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(old_tail) => self.set_next(old_tail, Some(idx)),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.index.insert(page_id, idx);
    }

    /// Unlink the node in `idx` and free its slot.
    fn unlink(&mut self, idx: usize) -> Option<PageId> {
        let node = self.slots.get_mut(idx)?.take()?;

        match node.prev {
            Some(p) => self.set_next(p, node.next),
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.set_prev(n, node.prev),
            None => self.tail = node.prev,
        }

        self.free_slots.push(idx);
        self.index.remove(&node.page_id);
        Some(node.page_id)
    }

    fn set_next(&mut self, idx: usize, next: Option<usize>) {
        if let Some(Some(node)) = self.slots.get_mut(idx) {
            node.next = next;
        }
    }

    fn set_prev(&mut self, idx: usize, prev: Option<usize>) {
        if let Some(Some(node)) = self.slots.get_mut(idx) {
            node.prev = prev;
        }
    }
}

impl ReplacementPolicy for LruReplacer {
    fn add(&mut self, page_id: PageId) {
        // Re-adding refreshes recency instead of duplicating the entry.
        if let Some(&idx) = self.index.get(&page_id) {
            self.unlink(idx);
        }
        self.push_back(page_id);
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(&idx) = self.index.get(&page_id) {
            self.unlink(idx);
        }
    }

    fn evict(&mut self) -> Option<PageId> {
        let head = self.head?;
        self.unlink(head)
    }

    fn contains(&self, page_id: PageId) -> bool {
        self.index.contains_key(&page_id)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> PageId {
        PageId::new(n)
    }

    #[test]
    fn test_lru_evicts_in_unpin_order() {
        let mut lru = LruReplacer::new();
        lru.add(pid(1));
        lru.add(pid(2));
        lru.add(pid(3));

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict(), Some(pid(1)));
        assert_eq!(lru.evict(), Some(pid(2)));
        assert_eq!(lru.evict(), Some(pid(3)));
        assert_eq!(lru.evict(), None);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_remove_middle_head_tail() {
        let mut lru = LruReplacer::new();
        for n in 0..5 {
            lru.add(pid(n));
        }

        lru.remove(pid(2)); // middle
        lru.remove(pid(0)); // head
        lru.remove(pid(4)); // tail
        lru.remove(pid(42)); // absent

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(pid(2)));
        assert_eq!(lru.evict(), Some(pid(1)));
        assert_eq!(lru.evict(), Some(pid(3)));
        assert_eq!(lru.evict(), None);
    }

    #[test]
    fn test_lru_repin_and_unpin_moves_to_back() {
        let mut lru = LruReplacer::new();
        lru.add(pid(1));
        lru.add(pid(2));
        lru.add(pid(3));

        // Page 1 is pinned again, then unpinned: now most recent.
        lru.remove(pid(1));
        lru.add(pid(1));

        assert_eq!(lru.evict(), Some(pid(2)));
        assert_eq!(lru.evict(), Some(pid(3)));
        assert_eq!(lru.evict(), Some(pid(1)));
    }

    #[test]
    fn test_lru_readd_does_not_duplicate() {
        let mut lru = LruReplacer::new();
        lru.add(pid(7));
        lru.add(pid(8));
        lru.add(pid(7));

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict(), Some(pid(8)));
        assert_eq!(lru.evict(), Some(pid(7)));
        assert_eq!(lru.evict(), None);
    }

    #[test]
    fn test_lru_reuses_slots() {
        let mut lru = LruReplacer::new();
        for round in 0..10 {
            lru.add(pid(round));
            lru.add(pid(round + 100));
            assert_eq!(lru.evict(), Some(pid(round)));
            assert_eq!(lru.evict(), Some(pid(round + 100)));
        }
        assert!(lru.slots.len() <= 2);
    }
}
