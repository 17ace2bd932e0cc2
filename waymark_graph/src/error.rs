use thiserror::Error;

use crate::graph::MAX_GRAPHS;

/// Errors from structural graph operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The store already holds the maximum number of graphs the flags
    /// word can address.
    #[error("graph limit of {MAX_GRAPHS} reached")]
    GraphLimit,
    /// A graph index that does not name a registered graph.
    #[error("unknown graph index {0}")]
    UnknownGraph(u32),
}
