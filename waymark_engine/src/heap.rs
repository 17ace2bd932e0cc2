// The open list: a Vec-backed binary min-heap.
//
// The search pushes duplicate entries instead of decreasing keys; stale
// duplicates are skipped at pop time by comparing against the node's
// current g (see `search.rs`). `clear` keeps the allocation, so one heap
// is reused across every search a worker runs.
//
// Ordering is fully deterministic: lowest f first, ties broken by lower g,
// then lower node index. Two runs over the same graph pop in the same
// order regardless of insertion history.
//
// See also: `run_data.rs` which owns one `OpenList` per worker.

use waymark_graph::NodeIndex;

/// Starting capacity for a worker's open list. Grows geometrically with
/// the `Vec` when a search needs more.
pub const INITIAL_OPEN_CAPACITY: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapEntry {
    pub node: NodeIndex,
    /// g + h at push time.
    pub f: u32,
    /// g at push time; used to detect stale duplicates and break f ties.
    pub g: u32,
}

impl HeapEntry {
    /// Strict ordering: does `self` pop before `other`?
    fn before(self, other: HeapEntry) -> bool {
        (self.f, self.g, self.node.0) < (other.f, other.g, other.node.0)
    }
}

/// Min-heap of open-list entries.
#[derive(Clone, Debug)]
pub struct OpenList {
    entries: Vec<HeapEntry>,
}

impl Default for OpenList {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenList {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(INITIAL_OPEN_CAPACITY),
        }
    }

    /// Drop all entries, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: HeapEntry) {
        self.entries.push(entry);
        self.sift_up(self.entries.len() - 1);
    }

    /// Remove and return the entry with the lowest (f, g, node) key.
    pub fn pop(&mut self) -> Option<HeapEntry> {
        let last = self.entries.len().checked_sub(1)?;
        self.entries.swap(0, last);
        let top = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        top
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[i].before(self.entries[parent]) {
                self.entries.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < len && self.entries[left].before(self.entries[smallest]) {
                smallest = left;
            }
            if right < len && self.entries[right].before(self.entries[smallest]) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.entries.swap(i, smallest);
            i = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: u32, f: u32, g: u32) -> HeapEntry {
        HeapEntry {
            node: NodeIndex(node),
            f,
            g,
        }
    }

    #[test]
    fn pops_in_f_order() {
        let mut heap = OpenList::new();
        heap.push(entry(0, 30, 10));
        heap.push(entry(1, 10, 5));
        heap.push(entry(2, 20, 7));

        assert_eq!(heap.pop().unwrap().f, 10);
        assert_eq!(heap.pop().unwrap().f, 20);
        assert_eq!(heap.pop().unwrap().f, 30);
        assert!(heap.pop().is_none());
    }

    #[test]
    fn ties_break_by_g_then_node() {
        let mut heap = OpenList::new();
        heap.push(entry(5, 10, 8));
        heap.push(entry(3, 10, 4));
        heap.push(entry(7, 10, 4));

        // Same f: lower g first; same g: lower node index first.
        assert_eq!(heap.pop().unwrap().node, NodeIndex(3));
        assert_eq!(heap.pop().unwrap().node, NodeIndex(7));
        assert_eq!(heap.pop().unwrap().node, NodeIndex(5));
    }

    #[test]
    fn order_is_insertion_independent() {
        let entries = [
            entry(0, 5, 1),
            entry(1, 3, 2),
            entry(2, 3, 1),
            entry(3, 9, 0),
            entry(4, 1, 1),
        ];

        let mut forward = OpenList::new();
        for e in entries {
            forward.push(e);
        }
        let mut backward = OpenList::new();
        for e in entries.iter().rev() {
            backward.push(*e);
        }

        loop {
            let a = forward.pop();
            let b = backward.pop();
            assert_eq!(a, b);
            if a.is_none() {
                break;
            }
        }
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut heap = OpenList::new();
        for i in 0..2000 {
            heap.push(entry(i, i, 0));
        }
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.len(), 0);
        // Usable again after clearing.
        heap.push(entry(1, 1, 1));
        assert_eq!(heap.pop().unwrap().node, NodeIndex(1));
    }

    #[test]
    fn heap_sorts_random_sequence() {
        // Deterministic pseudo-random insertions, verified against a sort.
        let mut heap = OpenList::new();
        let mut keys = Vec::new();
        let mut x: u32 = 0x2545_f491;
        for i in 0..500 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            let f = x % 1000;
            heap.push(entry(i, f, 0));
            keys.push((f, 0u32, i));
        }
        keys.sort_unstable();
        for key in keys {
            let e = heap.pop().unwrap();
            assert_eq!((e.f, e.g, e.node.0), key);
        }
    }
}
