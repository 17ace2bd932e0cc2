// Nearest-node queries with constraints.
//
// Point-to-node resolution is a linear scan over the arena filtered by an
// `NnConstraint`. The engine resolves path endpoints through this: the start
// from the request's own constraint, the end additionally pinned to the
// start node's area so an unreachable target is rejected before any search
// work happens.
//
// See also: `graph.rs` for the arena being scanned, `area.rs` for the area
// labels the constraint can filter on.

use crate::graph::{GraphStore, Node};
use crate::types::{Int3, NodeIndex};

/// Filter for nearest-node queries. Fields with a `constrain_` switch are
/// only checked when the switch is on.
#[derive(Clone, Copy, Debug)]
pub struct NnConstraint {
    /// Bitmask of graph indices to consider. Bit `i` set = graph `i` included.
    pub graph_mask: u32,
    pub constrain_walkability: bool,
    pub walkable: bool,
    pub constrain_area: bool,
    pub area: u8,
    pub constrain_tags: bool,
    /// Bitmask of acceptable tags. Bit `t` set = tag `t` acceptable.
    pub tags: u32,
    /// When off, the distance cap passed to `nearest_node` is ignored.
    pub constrain_distance: bool,
}

impl Default for NnConstraint {
    /// Walkable nodes only, any graph, any tag, distance cap honored.
    fn default() -> Self {
        Self {
            graph_mask: u32::MAX,
            constrain_walkability: true,
            walkable: true,
            constrain_area: false,
            area: 0,
            constrain_tags: false,
            tags: u32::MAX,
            constrain_distance: true,
        }
    }
}

impl NnConstraint {
    /// No filtering at all: any node in any graph at any distance.
    pub fn none() -> Self {
        Self {
            graph_mask: u32::MAX,
            constrain_walkability: false,
            walkable: true,
            constrain_area: false,
            area: 0,
            constrain_tags: false,
            tags: u32::MAX,
            constrain_distance: false,
        }
    }

    /// Whether `node` passes every enabled filter.
    pub fn suitable(&self, node: &Node) -> bool {
        if self.graph_mask & (1 << node.flags.graph_index()) == 0 {
            return false;
        }
        if self.constrain_walkability && node.flags.walkable() != self.walkable {
            return false;
        }
        if self.constrain_area && node.flags.area() != self.area {
            return false;
        }
        if self.constrain_tags && self.tags & (1 << node.flags.tag()) == 0 {
            return false;
        }
        true
    }
}

/// A resolved nearest-node result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NearestNode {
    pub node: NodeIndex,
    pub position: Int3,
    /// Squared distance from the query point, in sub-units.
    pub distance_sq: i64,
}

/// Find the node closest to `position` that satisfies `constraint`.
///
/// `max_distance` is in `Int3` sub-units and applies only when the
/// constraint's `constrain_distance` is on. Ties go to the lower node
/// index (scan order), keeping results deterministic.
pub fn nearest_node(
    store: &GraphStore,
    position: Int3,
    constraint: &NnConstraint,
    max_distance: u32,
) -> Option<NearestNode> {
    let max_sq = i64::from(max_distance) * i64::from(max_distance);
    let mut best: Option<NearestNode> = None;

    for (i, node) in store.nodes().iter().enumerate() {
        if !constraint.suitable(node) {
            continue;
        }
        let d = (node.position - position).sq_magnitude();
        if constraint.constrain_distance && d > max_sq {
            continue;
        }
        if best.is_none_or(|b| d < b.distance_sq) {
            best = Some(NearestNode {
                node: NodeIndex(i as u32),
                position: node.position,
                distance_sq: d,
            });
        }
    }

    best
}
