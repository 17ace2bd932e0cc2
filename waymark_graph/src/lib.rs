// Navigation graph data for the waymark pathfinding engine.
//
// This crate owns everything that describes the world being searched:
// fixed-point positions (`Int3`), bit-packed per-node flags, the dense node
// arena (`GraphStore`), nearest-node queries with constraints, flood-fill
// area labeling, and batched graph mutations with rollback.
//
// The engine crate (`waymark_engine`) layers the search, scheduling and
// delivery machinery on top of this data.

pub mod area;
pub mod error;
pub mod flags;
pub mod graph;
pub mod nearest;
pub mod types;
pub mod update;

pub use area::{FloodFillStats, SMALL_AREA_ID, flood_fill};
pub use error::GraphError;
pub use flags::NodeFlags;
pub use graph::{Connection, GraphStore, MAX_GRAPHS, Node};
pub use nearest::{NearestNode, NnConstraint, nearest_node};
pub use types::{Heuristic, Int3, NodeIndex};
pub use update::{Bounds, GraphUpdate};
