// Batched graph mutations.
//
// A `GraphUpdate` describes one edit to every node inside an axis-aligned
// box: add a penalty, force walkability, retag. The engine queues these and
// applies whole batches at a safe point while no search is running, then
// flood fills once per batch if any update changed connectivity.
//
// With change tracking on, `apply` snapshots each touched node's flags word
// and penalty so `revert` can restore them later (temporary obstructions,
// speculative edits).
//
// See also: `waymark_engine::engine::Engine::queue_update` /
// `flush_updates` for the batching and safe-point protocol.

use crate::flags::NodeFlags;
use crate::graph::{GraphStore, PENALTY_WARN_THRESHOLD};
use crate::types::{Int3, NodeIndex};

/// Inclusive axis-aligned box in fixed-point coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min: Int3,
    pub max: Int3,
}

impl Bounds {
    pub fn new(min: Int3, max: Int3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Int3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

/// Pre-mutation snapshot of one node, for `revert`.
#[derive(Clone, Copy, Debug)]
struct NodeBackup {
    node: NodeIndex,
    flags_bits: u32,
    penalty: u32,
}

/// One queued mutation over a bounding box.
#[derive(Debug)]
pub struct GraphUpdate {
    pub bounds: Bounds,
    /// Signed penalty delta. The result saturates at zero; penalties never
    /// underflow.
    pub add_penalty: i32,
    pub set_walkable: Option<bool>,
    pub set_tag: Option<u8>,
    /// Whether applying this update invalidates area labels. Set
    /// automatically when walkability changes.
    pub requires_flood_fill: bool,
    /// Snapshot touched nodes so the update can be reverted.
    pub track_changes: bool,
    backup: Vec<NodeBackup>,
}

impl GraphUpdate {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            add_penalty: 0,
            set_walkable: None,
            set_tag: None,
            requires_flood_fill: false,
            track_changes: false,
            backup: Vec::new(),
        }
    }

    /// Force walkability inside the bounds. Implies a flood fill.
    pub fn with_walkable(mut self, walkable: bool) -> Self {
        self.set_walkable = Some(walkable);
        self.requires_flood_fill = true;
        self
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.set_tag = Some(tag);
        self
    }

    pub fn with_penalty(mut self, delta: i32) -> Self {
        self.add_penalty = delta;
        self
    }

    /// Enable change tracking so the update can be reverted.
    pub fn tracked(mut self) -> Self {
        self.track_changes = true;
        self
    }

    /// Apply to every node whose position lies inside the bounds.
    pub fn apply(&mut self, store: &mut GraphStore) {
        for i in 0..store.node_count() {
            let index = NodeIndex(i as u32);
            if !self.bounds.contains(store.node(index).position) {
                continue;
            }

            if self.track_changes {
                let node = store.node(index);
                self.backup.push(NodeBackup {
                    node: index,
                    flags_bits: node.flags.bits(),
                    penalty: node.penalty,
                });
            }

            if self.add_penalty != 0 {
                let old = i64::from(store.node(index).penalty);
                let new = (old + i64::from(self.add_penalty)).clamp(0, i64::from(u32::MAX));
                let new = new as u32;
                if new > PENALTY_WARN_THRESHOLD {
                    log::warn!(
                        "node {} penalty {} exceeds {} after update",
                        index.0,
                        new,
                        PENALTY_WARN_THRESHOLD
                    );
                }
                store.node_mut(index).penalty = new;
            }
            if let Some(walkable) = self.set_walkable {
                store.node_mut(index).flags.set_walkable(walkable);
            }
            if let Some(tag) = self.set_tag {
                store.node_mut(index).flags.set_tag(tag);
            }
        }
    }

    /// Restore the snapshots taken by a tracked `apply`. Does nothing when
    /// tracking was off. The caller is responsible for re-running the flood
    /// fill if this update required one.
    pub fn revert(&self, store: &mut GraphStore) {
        for backup in self.backup.iter().rev() {
            let node = store.node_mut(backup.node);
            node.flags = NodeFlags::from_bits(backup.flags_bits);
            node.penalty = backup.penalty;
        }
    }

    /// Number of nodes touched by the last tracked `apply`.
    pub fn tracked_count(&self) -> usize {
        self.backup.len()
    }
}
