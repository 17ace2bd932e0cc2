// Bit-packed per-node flags.
//
// Every node carries one `u32` flags word holding its walkability, area id,
// owning graph index, and traversal tag. Packing these into a single word
// keeps `Node` small and lets graph mutations snapshot and restore a node's
// entire flag state as one integer (see `update.rs`).
//
// Layout:
//   bit  23      walkable
//   bits 24..=31 area id (0-255, 254 reserved for small islands)
//   bits 18..=22 graph index (0-31)
//   bits  9..=13 traversal tag (0-31)
//   bits 15, 16  reserved for graph-construction bookkeeping
//
// **Critical constraint: the raw word is private.** All access goes through
// masked getters/setters; only the mutation-rollback code in `update.rs`
// sees the raw bits, via crate-private accessors.

use serde::{Deserialize, Serialize};

const WALKABLE_BIT: u32 = 23;
const AREA_SHIFT: u32 = 24;
const AREA_MASK: u32 = 0xFF << AREA_SHIFT;
const GRAPH_SHIFT: u32 = 18;
const GRAPH_MASK: u32 = 0x1F << GRAPH_SHIFT;
const TAG_SHIFT: u32 = 9;
const TAG_MASK: u32 = 0x1F << TAG_SHIFT;
const SCRATCH_A_BIT: u32 = 15;
const SCRATCH_B_BIT: u32 = 16;

/// One node's packed flag word. See the module comment for the layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags(u32);

impl NodeFlags {
    pub fn new(walkable: bool, graph_index: u32) -> Self {
        let mut flags = Self::default();
        flags.set_walkable(walkable);
        flags.set_graph_index(graph_index);
        flags
    }

    pub fn walkable(self) -> bool {
        self.0 & (1 << WALKABLE_BIT) != 0
    }

    pub fn set_walkable(&mut self, walkable: bool) {
        if walkable {
            self.0 |= 1 << WALKABLE_BIT;
        } else {
            self.0 &= !(1 << WALKABLE_BIT);
        }
    }

    /// Connected-component label assigned by flood fill. Two walkable nodes
    /// can reach each other only if their areas match.
    pub fn area(self) -> u8 {
        ((self.0 & AREA_MASK) >> AREA_SHIFT) as u8
    }

    pub fn set_area(&mut self, area: u8) {
        self.0 = (self.0 & !AREA_MASK) | (u32::from(area) << AREA_SHIFT);
    }

    /// Index of the graph this node belongs to (0-31).
    pub fn graph_index(self) -> u32 {
        (self.0 & GRAPH_MASK) >> GRAPH_SHIFT
    }

    pub fn set_graph_index(&mut self, graph: u32) {
        debug_assert!(graph < 32, "graph index {graph} out of range");
        self.0 = (self.0 & !GRAPH_MASK) | ((graph & 0x1F) << GRAPH_SHIFT);
    }

    /// Traversal tag (0-31). Requests carry a bitmask of tags they may
    /// cross and a per-tag penalty table.
    pub fn tag(self) -> u8 {
        ((self.0 & TAG_MASK) >> TAG_SHIFT) as u8
    }

    pub fn set_tag(&mut self, tag: u8) {
        debug_assert!(tag < 32, "tag {tag} out of range");
        self.0 = (self.0 & !TAG_MASK) | ((u32::from(tag) & 0x1F) << TAG_SHIFT);
    }

    /// Graph-construction scratch bit. Not touched by the engine.
    pub fn scratch_a(self) -> bool {
        self.0 & (1 << SCRATCH_A_BIT) != 0
    }

    pub fn set_scratch_a(&mut self, value: bool) {
        if value {
            self.0 |= 1 << SCRATCH_A_BIT;
        } else {
            self.0 &= !(1 << SCRATCH_A_BIT);
        }
    }

    /// Second graph-construction scratch bit. Not touched by the engine.
    pub fn scratch_b(self) -> bool {
        self.0 & (1 << SCRATCH_B_BIT) != 0
    }

    pub fn set_scratch_b(&mut self, value: bool) {
        if value {
            self.0 |= 1 << SCRATCH_B_BIT;
        } else {
            self.0 &= !(1 << SCRATCH_B_BIT);
        }
    }

    /// Raw word for mutation-rollback snapshots.
    pub(crate) fn bits(self) -> u32 {
        self.0
    }

    /// Restore from a rollback snapshot.
    pub(crate) fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_independent() {
        let mut flags = NodeFlags::new(true, 7);
        flags.set_area(200);
        flags.set_tag(13);
        flags.set_scratch_a(true);

        assert!(flags.walkable());
        assert_eq!(flags.graph_index(), 7);
        assert_eq!(flags.area(), 200);
        assert_eq!(flags.tag(), 13);
        assert!(flags.scratch_a());
        assert!(!flags.scratch_b());

        // Clearing one field leaves the others intact.
        flags.set_walkable(false);
        assert!(!flags.walkable());
        assert_eq!(flags.graph_index(), 7);
        assert_eq!(flags.area(), 200);
        assert_eq!(flags.tag(), 13);
    }

    #[test]
    fn area_covers_full_byte() {
        let mut flags = NodeFlags::default();
        for area in [0u8, 1, 127, 254, 255] {
            flags.set_area(area);
            assert_eq!(flags.area(), area);
        }
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut flags = NodeFlags::new(true, 3);
        flags.set_area(42);
        flags.set_tag(5);
        let restored = NodeFlags::from_bits(flags.bits());
        assert_eq!(restored, flags);
    }
}
