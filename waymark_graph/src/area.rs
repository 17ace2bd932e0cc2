// Flood-fill area labeling.
//
// Every walkable node gets an 8-bit area id such that two nodes share an id
// exactly when the fill could walk between them. Path requests use this to
// reject unreachable targets in O(1) before any search work: if start and
// end areas differ, there is no path.
//
// Components smaller than the configured minimum are all labeled with the
// reserved id `SMALL_AREA_ID` instead of consuming a regular id. This keeps
// tiny islands (a few orphaned nodes from graph construction) from eating
// into the 253 usable regular ids.
//
// The fill is an explicit-stack DFS over stored connections. Connections
// are followed in their stored (directed) order, so one-way links produce
// one-way areas; graphs built with `GraphStore::connect` are symmetric.
//
// See also: `flags.rs` for where the id lives, `nearest.rs` whose area
// constraint reads it, `waymark_engine::engine` which re-fills after
// mutation batches.

use crate::graph::GraphStore;
use crate::types::NodeIndex;

/// Reserved area id shared by all components below the minimum size.
pub const SMALL_AREA_ID: u8 = 254;

/// Counters reported by one flood fill pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FloodFillStats {
    /// Regular areas labeled (excluding the shared small-island id).
    pub area_count: u32,
    /// Components relabeled to `SMALL_AREA_ID`.
    pub small_areas: u32,
    /// True when the graph had more components than the 8-bit id space
    /// can hold. Unlabeled nodes keep area 0.
    pub truncated: bool,
}

/// Relabel every walkable node's area id. Components with fewer than
/// `min_area_size` nodes share `SMALL_AREA_ID`.
///
/// Runs out of id space after 254 regular areas; the overflow is logged
/// once, labeling stops, and the remaining nodes keep area 0. Reachability
/// answers involving those nodes are unreliable until the graph is
/// simplified.
pub fn flood_fill(store: &mut GraphStore, min_area_size: usize) -> FloodFillStats {
    let n = store.node_count();
    for i in 0..n {
        store.node_mut(NodeIndex(i as u32)).flags.set_area(0);
    }

    let mut stats = FloodFillStats::default();
    let mut next_area: u32 = 1;
    let mut stack: Vec<NodeIndex> = Vec::new();
    let mut component: Vec<NodeIndex> = Vec::new();
    let mut neighbors: Vec<NodeIndex> = Vec::new();

    for i in 0..n {
        let seed = NodeIndex(i as u32);
        let node = store.node(seed);
        if !node.flags.walkable() || node.flags.area() != 0 {
            continue;
        }
        if next_area > u32::from(u8::MAX) {
            log::error!(
                "more than {} connected areas; remaining walkable nodes keep area 0",
                u8::MAX
            );
            stats.truncated = true;
            break;
        }

        let label = next_area as u8;
        component.clear();
        stack.push(seed);
        store.node_mut(seed).flags.set_area(label);

        while let Some(current) = stack.pop() {
            component.push(current);
            neighbors.clear();
            neighbors.extend(store.node(current).connections.iter().map(|c| c.target));
            for &target in &neighbors {
                let tn = store.node(target);
                if tn.flags.walkable() && tn.flags.area() == 0 {
                    store.node_mut(target).flags.set_area(label);
                    stack.push(target);
                }
            }
        }

        if component.len() < min_area_size {
            for &member in &component {
                store.node_mut(member).flags.set_area(SMALL_AREA_ID);
            }
            stats.small_areas += 1;
        } else {
            stats.area_count += 1;
            next_area += 1;
            if next_area == u32::from(SMALL_AREA_ID) {
                next_area += 1;
            }
        }
    }

    stats
}
