// Per-worker search scratch.
//
// Each worker owns one `RunData`: an open list plus one `NodeRun` record
// per graph node. Records are never cleared between searches; instead each
// record carries the id of the search that last touched it, and a record
// whose stamp differs from the current search id is "unvisited". Starting
// a search is O(1) instead of O(nodes).
//
// Two things force a full reset: the graph's `structure_version` changed
// (node indices were reassigned, so old records describe the wrong nodes)
// or the engine's stamp epoch changed (the 16-bit request-id counter
// wrapped, so old stamps could collide with new ids).
//
// See also: `heap.rs` for the open list, `search.rs` for the loop that
// reads and writes these records, `engine.rs` for the epoch counter.

use waymark_graph::{GraphStore, NodeIndex};

use crate::heap::OpenList;
use crate::path::PathId;

/// Sentinel parent for the start node of a search.
pub const NO_PARENT: u32 = u32::MAX;

/// Mutable per-node search state, valid only while its `search_id` stamp
/// matches the running search.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeRun {
    pub g: u32,
    pub h: u32,
    /// Index of the node this one was reached from, or `NO_PARENT`.
    pub parent: u32,
    /// Id of the search that last wrote this record. 0 = never touched.
    pub search_id: u16,
}

/// One worker's reusable search scratch.
#[derive(Debug, Default)]
pub struct RunData {
    pub(crate) runs: Vec<NodeRun>,
    pub(crate) open: OpenList,
    search_id: u16,
    structure_version: u64,
    stamp_epoch: u32,
}

impl RunData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a new search id and make the scratch match the graph. Cheap
    /// unless the graph's structure or the stamp epoch changed since the
    /// last search this scratch ran.
    pub fn begin_search(&mut self, id: PathId, graph: &GraphStore, epoch: u32) {
        let n = graph.node_count();
        if n != self.runs.len()
            || graph.structure_version() != self.structure_version
            || epoch != self.stamp_epoch
        {
            self.runs.clear();
            self.runs.resize(n, NodeRun::default());
            self.structure_version = graph.structure_version();
            self.stamp_epoch = epoch;
        }
        self.search_id = id.0;
        self.open.clear();
    }

    pub fn search_id(&self) -> u16 {
        self.search_id
    }

    /// Whether this scratch still describes `graph`. False once a
    /// structural change has reassigned node indices, in which case a
    /// suspended search must not resume over the stale records.
    pub fn matches(&self, graph: &GraphStore) -> bool {
        self.runs.len() == graph.node_count()
            && self.structure_version == graph.structure_version()
    }

    /// Whether `node` has been touched by the current search.
    pub fn visited(&self, node: NodeIndex) -> bool {
        self.runs[node.index()].search_id == self.search_id
    }
}
