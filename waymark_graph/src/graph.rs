// Dense node storage for all graphs.
//
// All nodes from all graphs live in one `Vec<Node>` indexed by `NodeIndex`.
// Each node's flags word records which graph owns it, so per-graph views are
// filters over the shared arena rather than separate collections. Indices
// are dense: removing a graph renumbers every surviving node and bumps
// `structure_version` so search scratch buffers know their stamps are stale.
//
// Storage is `Vec` throughout for O(1) lookup and deterministic iteration
// order. No `HashMap`.
//
// See also: `area.rs` for flood-fill labeling over this arena, `update.rs`
// for batched mutations, `waymark_engine`'s `run_data` module which watches
// `structure_version`.
//
// **Critical constraint: no internal locking.** The store is plain data;
// the engine serializes access through its graph lock.

use crate::error::GraphError;
use crate::flags::NodeFlags;
use crate::types::{Int3, NodeIndex};
use smallvec::SmallVec;

/// Upper bound on registered graphs, fixed by the 5-bit graph-index field
/// in the flags word.
pub const MAX_GRAPHS: u32 = 32;

/// Penalties above this are almost certainly an underflow in the caller
/// (a subtraction that went below zero before conversion). The setter
/// logs a warning but stores the value.
pub const PENALTY_WARN_THRESHOLD: u32 = 1 << 24;

/// A directed, weighted link to another node. A two-way link is two
/// `Connection`s, one on each endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub target: NodeIndex,
    /// Traversal cost in `Int3` sub-units.
    pub cost: u32,
}

/// One node: a position, packed flags, an extra traversal penalty, and its
/// outgoing connections.
#[derive(Clone, Debug)]
pub struct Node {
    pub position: Int3,
    pub flags: NodeFlags,
    pub penalty: u32,
    pub connections: SmallVec<[Connection; 4]>,
}

/// The shared node arena for all graphs.
#[derive(Clone, Debug, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    graph_count: u32,
    structure_version: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new graph and return its index.
    pub fn add_graph(&mut self) -> Result<u32, GraphError> {
        if self.graph_count >= MAX_GRAPHS {
            return Err(GraphError::GraphLimit);
        }
        let index = self.graph_count;
        self.graph_count += 1;
        self.structure_version += 1;
        Ok(index)
    }

    /// Remove a graph and all of its nodes. Surviving nodes are renumbered
    /// densely; graphs above the removed one shift down by one index.
    /// Connections into the removed graph are dropped.
    pub fn remove_graph(&mut self, graph: u32) -> Result<(), GraphError> {
        if graph >= self.graph_count {
            return Err(GraphError::UnknownGraph(graph));
        }

        // Old index -> new index, or None for removed nodes.
        let mut remap: Vec<Option<NodeIndex>> = vec![None; self.nodes.len()];
        let mut next = 0u32;
        for (old, node) in self.nodes.iter().enumerate() {
            if node.flags.graph_index() != graph {
                remap[old] = Some(NodeIndex(next));
                next += 1;
            }
        }

        let mut survivors = Vec::with_capacity(next as usize);
        for (old, mut node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if remap[old].is_none() {
                continue;
            }
            node.connections.retain(|c| remap[c.target.index()].is_some());
            for c in &mut node.connections {
                c.target = remap[c.target.index()].unwrap_or(c.target);
            }
            let owner = node.flags.graph_index();
            if owner > graph {
                node.flags.set_graph_index(owner - 1);
            }
            survivors.push(node);
        }

        self.nodes = survivors;
        self.graph_count -= 1;
        self.structure_version += 1;
        Ok(())
    }

    /// Add a node to a registered graph. Returns its index.
    pub fn add_node(
        &mut self,
        graph: u32,
        position: Int3,
        walkable: bool,
    ) -> Result<NodeIndex, GraphError> {
        if graph >= self.graph_count {
            return Err(GraphError::UnknownGraph(graph));
        }
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            position,
            flags: NodeFlags::new(walkable, graph),
            penalty: 0,
            connections: SmallVec::new(),
        });
        self.structure_version += 1;
        Ok(index)
    }

    /// Add a directed connection, or update its cost if one already exists.
    pub fn add_connection(&mut self, from: NodeIndex, to: NodeIndex, cost: u32) {
        let connections = &mut self.nodes[from.index()].connections;
        if let Some(existing) = connections.iter_mut().find(|c| c.target == to) {
            existing.cost = cost;
        } else {
            connections.push(Connection { target: to, cost });
        }
    }

    /// Remove the directed connection `from -> to` if present.
    pub fn remove_connection(&mut self, from: NodeIndex, to: NodeIndex) {
        self.nodes[from.index()].connections.retain(|c| c.target != to);
    }

    /// Add a two-way connection with the same cost in both directions.
    pub fn connect(&mut self, a: NodeIndex, b: NodeIndex, cost: u32) {
        self.add_connection(a, b, cost);
        self.add_connection(b, a, cost);
    }

    /// Recompute every outgoing connection cost of `node` from current
    /// positions. Used after a node has been moved.
    pub fn recalculate_connection_costs(&mut self, node: NodeIndex) {
        let origin = self.nodes[node.index()].position;
        let costs: Vec<u32> = self.nodes[node.index()]
            .connections
            .iter()
            .map(|c| (self.nodes[c.target.index()].position - origin).cost_magnitude())
            .collect();
        for (c, cost) in self.nodes[node.index()].connections.iter_mut().zip(costs) {
            c.cost = cost;
        }
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.index()]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn graph_count(&self) -> u32 {
        self.graph_count
    }

    /// Bumped by every structural change (node added, graph removed).
    /// Holders of `NodeIndex` values or index-stamped scratch buffers must
    /// treat them as stale when this changes.
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    pub fn set_walkable(&mut self, index: NodeIndex, walkable: bool) {
        self.nodes[index.index()].flags.set_walkable(walkable);
    }

    pub fn set_tag(&mut self, index: NodeIndex, tag: u8) {
        self.nodes[index.index()].flags.set_tag(tag);
    }

    pub fn set_penalty(&mut self, index: NodeIndex, penalty: u32) {
        if penalty > PENALTY_WARN_THRESHOLD {
            log::warn!(
                "node {} penalty {} exceeds {}; possible underflow in caller",
                index.0,
                penalty,
                PENALTY_WARN_THRESHOLD
            );
        }
        self.nodes[index.index()].penalty = penalty;
    }

    /// Whether two nodes lie in the same flood-filled area and are both
    /// walkable. Stale after mutations until the next flood fill.
    pub fn is_area_reachable(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let na = &self.nodes[a.index()];
        let nb = &self.nodes[b.index()];
        na.flags.walkable() && nb.flags.walkable() && na.flags.area() == nb.flags.area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_assigns_sequential_indices() {
        let mut store = GraphStore::new();
        let g = store.add_graph().unwrap();
        let a = store.add_node(g, Int3::new(0, 0, 0), true).unwrap();
        let b = store.add_node(g, Int3::new(1000, 0, 0), true).unwrap();
        assert_eq!(a, NodeIndex(0));
        assert_eq!(b, NodeIndex(1));
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.node(b).flags.graph_index(), g);
    }

    #[test]
    fn add_node_to_unknown_graph_fails() {
        let mut store = GraphStore::new();
        let err = store.add_node(0, Int3::default(), true).unwrap_err();
        assert_eq!(err, GraphError::UnknownGraph(0));
    }

    #[test]
    fn graph_limit_enforced() {
        let mut store = GraphStore::new();
        for _ in 0..MAX_GRAPHS {
            store.add_graph().unwrap();
        }
        assert_eq!(store.add_graph().unwrap_err(), GraphError::GraphLimit);
    }

    #[test]
    fn add_connection_updates_existing_cost() {
        let mut store = GraphStore::new();
        let g = store.add_graph().unwrap();
        let a = store.add_node(g, Int3::new(0, 0, 0), true).unwrap();
        let b = store.add_node(g, Int3::new(1000, 0, 0), true).unwrap();

        store.add_connection(a, b, 1000);
        store.add_connection(a, b, 2500);
        assert_eq!(store.node(a).connections.len(), 1);
        assert_eq!(store.node(a).connections[0].cost, 2500);
    }

    #[test]
    fn connect_is_bidirectional() {
        let mut store = GraphStore::new();
        let g = store.add_graph().unwrap();
        let a = store.add_node(g, Int3::new(0, 0, 0), true).unwrap();
        let b = store.add_node(g, Int3::new(1000, 0, 0), true).unwrap();

        store.connect(a, b, 1000);
        assert_eq!(store.node(a).connections[0].target, b);
        assert_eq!(store.node(b).connections[0].target, a);

        store.remove_connection(a, b);
        assert!(store.node(a).connections.is_empty());
        // Reverse direction untouched.
        assert_eq!(store.node(b).connections.len(), 1);
    }

    #[test]
    fn remove_graph_renumbers_and_drops_cross_links() {
        let mut store = GraphStore::new();
        let g0 = store.add_graph().unwrap();
        let g1 = store.add_graph().unwrap();
        let a = store.add_node(g0, Int3::new(0, 0, 0), true).unwrap();
        let b = store.add_node(g1, Int3::new(1000, 0, 0), true).unwrap();
        let c = store.add_node(g0, Int3::new(2000, 0, 0), true).unwrap();
        store.connect(a, c, 2000);
        store.connect(a, b, 1000);

        let before = store.structure_version();
        store.remove_graph(g1).unwrap();
        assert!(store.structure_version() > before);

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.graph_count(), 1);
        // c moved from index 2 to index 1; a's link to b is gone.
        let a_links: Vec<_> = store.node(a).connections.iter().map(|x| x.target).collect();
        assert_eq!(a_links, vec![NodeIndex(1)]);
        assert_eq!(store.node(NodeIndex(1)).position, Int3::new(2000, 0, 0));
    }

    #[test]
    fn remove_graph_shifts_higher_graph_indices() {
        let mut store = GraphStore::new();
        let g0 = store.add_graph().unwrap();
        let g1 = store.add_graph().unwrap();
        let g2 = store.add_graph().unwrap();
        store.add_node(g0, Int3::default(), true).unwrap();
        let n2 = store.add_node(g2, Int3::new(1000, 0, 0), true).unwrap();
        let n2_pos = store.node(n2).position;

        store.remove_graph(g1).unwrap();
        // The g2 node survives and now reports graph index 1.
        let survivor = store
            .nodes()
            .iter()
            .find(|n| n.position == n2_pos)
            .unwrap();
        assert_eq!(survivor.flags.graph_index(), 1);
    }

    #[test]
    fn recalculate_connection_costs_uses_positions() {
        let mut store = GraphStore::new();
        let g = store.add_graph().unwrap();
        let a = store.add_node(g, Int3::new(0, 0, 0), true).unwrap();
        let b = store.add_node(g, Int3::new(3000, 0, 4000), true).unwrap();
        store.add_connection(a, b, 1);

        store.recalculate_connection_costs(a);
        assert_eq!(store.node(a).connections[0].cost, 5000);
    }
}
