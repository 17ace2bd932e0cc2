// Engine lifecycle events.
//
// Subscribers get a plain `mpsc::Receiver<EngineEvent>`; the engine keeps
// the matching senders and drops any whose receiver has gone away. Search
// events fire on worker threads, graph events on the consumer thread that
// applied the mutation. Subscribers must not assume a delivery thread.

use waymark_graph::FloodFillStats;

use crate::path::PathId;

/// Something the engine did that subscribers may want to observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// A request is about to be searched. Fires on the searching thread.
    PathPreSearch(PathId),
    /// A request's search finished (any status). Fires on the searching
    /// thread.
    PathPostSearch(PathId),
    /// A mutation batch was applied at a safe point.
    GraphsUpdated { flood_filled: bool },
    /// A flood fill pass finished, whether from a mutation batch or an
    /// explicit call.
    FloodFillCompleted(FloodFillStats),
    /// The request-id counter wrapped and per-worker search stamps were
    /// invalidated.
    StampEpochReset,
}
