//! Round-robin-with-random-insertion probe-target scheduler (§4.3).

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::node::Node;

/// Holds the ordered probe list and its rotating index. The local node is
/// never present in `list` (§3 invariant 2).
#[derive(Debug, Default)]
pub struct ProbeScheduler {
    list: Vec<Node>,
    index: usize,
}

impl ProbeScheduler {
    pub fn new() -> Self {
        ProbeScheduler {
            list: Vec::new(),
            index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.list.contains(node)
    }

    pub fn members(&self) -> &[Node] {
        &self.list
    }

    /// Inserts `node` at a uniformly random position. If the insertion point
    /// falls at or before the current index, the index is advanced so the
    /// new entry is neither skipped nor immediately re-pinged.
    pub fn insert(&mut self, node: Node, rng: &mut dyn RngCore) {
        if self.list.contains(&node) {
            return;
        }
        let was_empty = self.list.is_empty();
        let insert_idx = (rng.next_u64() as usize) % (self.list.len() + 1);
        self.list.insert(insert_idx, node);
        if !was_empty && insert_idx <= self.index {
            self.index += 1;
        }
    }

    /// Removes `node` if present, adjusting the rotating index (§4.3 Removal).
    pub fn remove(&mut self, node: &Node) -> bool {
        if let Some(r) = self.list.iter().position(|n| n == node) {
            self.list.remove(r);
            if r < self.index {
                self.index -= 1;
            }
            if self.index >= self.list.len() {
                self.index = 0;
            }
            true
        } else {
            false
        }
    }

    /// Returns the next probe target, advancing the index. Re-shuffles the
    /// list once a full traversal completes (index wraps to zero).
    pub fn next(&mut self, rng: &mut dyn RngCore) -> Option<Node> {
        if self.list.is_empty() {
            return None;
        }
        let target = self.list[self.index];
        self.index = (self.index + 1) % self.list.len();
        if self.index == 0 {
            self.list.shuffle(rng);
        }
        Some(target)
    }
}
