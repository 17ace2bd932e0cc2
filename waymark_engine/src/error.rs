use thiserror::Error;

use crate::path::PathState;

/// Engine-level failures. Per-request problems (no path, unsatisfiable
/// constraints, cost overflow) are not errors here; they are delivered as
/// an `Error` or `Partial` status on the request itself.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine is shutting down and rejects new requests.
    #[error("engine is not accepting new path requests")]
    NotAccepted,
    /// A request tried to skip or repeat a lifecycle state. Always a bug
    /// in the engine, never in the caller.
    #[error("invalid path state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: PathState, to: PathState },
    /// The worker pool exited while a caller was still waiting.
    #[error("pathfinding workers have stopped")]
    WorkersStopped,
    #[error(transparent)]
    Graph(#[from] waymark_graph::GraphError),
}
