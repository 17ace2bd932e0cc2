// Path requests and their lifecycle.
//
// A request moves through a strictly monotonic state machine:
//
//   Created -> Queued -> Processing -> ReturnQueued -> Returned
//
// `submit` advances Created->Queued, the searching thread Queued->
// Processing->ReturnQueued, delivery ReturnQueued->Returned. Any skip or
// repeat is an engine bug and is rejected with
// `EngineError::InvalidStateTransition` instead of silently corrupting the
// request.
//
// Orthogonal to the lifecycle, `CompleteState` records the search outcome:
// `Complete` (reached the target), `Partial` (open list exhausted; the path
// leads to the reachable node closest to the target), or `Error` (endpoint
// resolution failed, cost overflow, shutdown). No-path conditions are a
// request status, never a panic or an engine error.
//
// See also: `search.rs` for how the result fields are filled in,
// `engine.rs` for submit/delivery.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use waymark_graph::{Heuristic, Int3, NearestNode, NnConstraint, NodeIndex};

use crate::error::EngineError;

/// Identifier of one submitted request. 16 bits, wrapping; the engine
/// bumps its stamp epoch on wraparound so ids can be reused as search
/// stamps (see `run_data.rs`). Id 0 is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId(pub u16);

/// Lifecycle position of a request. Strictly monotonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathState {
    Created,
    Queued,
    Processing,
    ReturnQueued,
    Returned,
}

/// Outcome of the search, independent of the lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompleteState {
    #[default]
    NotCalculated,
    /// Endpoint resolution failed, cost arithmetic overflowed, or the
    /// engine shut down mid-search. Details in `error_log`.
    Error,
    Complete,
    /// The target was not reachable; the result leads to the searched
    /// node with the lowest remaining estimate.
    Partial,
}

/// Search statistics, filled by the searching thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes popped from the open list.
    pub iterations: u64,
    /// Connections relaxed.
    pub expanded: u64,
    pub duration: Duration,
}

/// The caller-visible result of a finished request.
#[derive(Clone, Debug)]
pub struct PathOutcome {
    pub id: PathId,
    pub complete: CompleteState,
    pub nodes: Vec<NodeIndex>,
    pub waypoints: Vec<Int3>,
    /// Total traversal cost in `Int3` sub-units (costs + penalties).
    pub cost: u32,
    pub error_log: String,
    pub stats: SearchStats,
}

/// Shared slot a handle and the delivery path meet at.
#[derive(Debug)]
pub(crate) struct RequestSlot {
    pub(crate) outcome: Mutex<Option<PathOutcome>>,
    pub(crate) ready: Condvar,
}

impl RequestSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        })
    }
}

/// Handle returned by `Engine::submit`. Poll with `try_outcome` or block
/// with `Engine::wait_for`.
#[derive(Clone, Debug)]
pub struct PathHandle {
    id: PathId,
    pub(crate) slot: Arc<RequestSlot>,
}

impl PathHandle {
    pub(crate) fn new(id: PathId, slot: Arc<RequestSlot>) -> Self {
        Self { id, slot }
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    /// The outcome, if the request has been delivered.
    pub fn try_outcome(&self) -> Option<PathOutcome> {
        self.slot.outcome.lock().clone()
    }
}

type Callback = Box<dyn FnOnce(&PathRequest) + Send>;

/// One point-to-point path request.
pub struct PathRequest {
    pub start: Int3,
    pub end: Int3,
    pub heuristic: Heuristic,
    pub heuristic_scale: f32,
    /// Bitmask of node tags the search may cross.
    pub enabled_tags: u32,
    /// Extra cost added when stepping onto a node with tag `t`.
    pub tag_penalties: [u32; 32],
    /// Constraint for resolving the start node. The end node additionally
    /// gets pinned to the start node's area.
    pub nn_constraint: NnConstraint,

    pub(crate) id: PathId,
    state: PathState,
    complete: CompleteState,

    pub(crate) start_node: Option<NearestNode>,
    pub(crate) end_node: Option<NearestNode>,
    /// Searched node with the lowest remaining estimate; the partial-path
    /// target when the open list runs dry.
    pub(crate) best_node: Option<NodeIndex>,
    pub(crate) best_h: u32,

    pub nodes: Vec<NodeIndex>,
    pub waypoints: Vec<Int3>,
    pub cost: u32,
    pub error_log: String,
    pub stats: SearchStats,

    pub(crate) callback: Option<Callback>,
    pub(crate) slot: Arc<RequestSlot>,
}

impl PathRequest {
    pub fn new(start: Int3, end: Int3) -> Self {
        Self {
            start,
            end,
            heuristic: Heuristic::default(),
            heuristic_scale: 1.0,
            enabled_tags: u32::MAX,
            tag_penalties: [0; 32],
            nn_constraint: NnConstraint::default(),
            id: PathId(0),
            state: PathState::Created,
            complete: CompleteState::NotCalculated,
            start_node: None,
            end_node: None,
            best_node: None,
            best_h: u32::MAX,
            nodes: Vec::new(),
            waypoints: Vec::new(),
            cost: 0,
            error_log: String::new(),
            stats: SearchStats::default(),
            callback: None,
            slot: RequestSlot::new(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic, scale: f32) -> Self {
        self.heuristic = heuristic;
        self.heuristic_scale = scale;
        self
    }

    pub fn with_enabled_tags(mut self, mask: u32) -> Self {
        self.enabled_tags = mask;
        self
    }

    pub fn with_tag_penalty(mut self, tag: u8, penalty: u32) -> Self {
        self.tag_penalties[tag as usize & 31] = penalty;
        self
    }

    pub fn with_constraint(mut self, constraint: NnConstraint) -> Self {
        self.nn_constraint = constraint;
        self
    }

    /// Invoked on the delivery thread right before the outcome becomes
    /// visible to the handle.
    pub fn with_callback(mut self, callback: impl FnOnce(&PathRequest) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn state(&self) -> PathState {
        self.state
    }

    pub fn complete_state(&self) -> CompleteState {
        self.complete
    }

    pub fn is_error(&self) -> bool {
        self.complete == CompleteState::Error
    }

    /// Advance the lifecycle by exactly one state.
    pub(crate) fn advance(&mut self, next: PathState) -> Result<(), EngineError> {
        let expected = match self.state {
            PathState::Created => PathState::Queued,
            PathState::Queued => PathState::Processing,
            PathState::Processing => PathState::ReturnQueued,
            PathState::ReturnQueued => PathState::Returned,
            PathState::Returned => {
                return Err(EngineError::InvalidStateTransition {
                    from: self.state,
                    to: next,
                });
            }
        };
        if next != expected {
            return Err(EngineError::InvalidStateTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Mark the request failed, appending to its error log.
    pub(crate) fn fail(&mut self, message: &str) {
        self.complete = CompleteState::Error;
        if !self.error_log.is_empty() {
            self.error_log.push('\n');
        }
        self.error_log.push_str(message);
    }

    pub(crate) fn set_complete(&mut self, complete: CompleteState) {
        self.complete = complete;
    }

    /// Snapshot the caller-visible fields for the handle slot.
    pub(crate) fn outcome(&self) -> PathOutcome {
        PathOutcome {
            id: self.id,
            complete: self.complete,
            nodes: self.nodes.clone(),
            waypoints: self.waypoints.clone(),
            cost: self.cost,
            error_log: self.error_log.clone(),
            stats: self.stats,
        }
    }
}

impl fmt::Debug for PathRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRequest")
            .field("id", &self.id)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("state", &self.state)
            .field("complete", &self.complete)
            .field("nodes", &self.nodes.len())
            .field("cost", &self.cost)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_advances_in_order() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        assert_eq!(req.state(), PathState::Created);
        req.advance(PathState::Queued).unwrap();
        req.advance(PathState::Processing).unwrap();
        req.advance(PathState::ReturnQueued).unwrap();
        req.advance(PathState::Returned).unwrap();
        assert_eq!(req.state(), PathState::Returned);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        let err = req.advance(PathState::Processing).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidStateTransition {
                from: PathState::Created,
                to: PathState::Processing,
            }
        );
        // The failed transition left the state untouched.
        assert_eq!(req.state(), PathState::Created);
    }

    #[test]
    fn repeating_a_state_is_rejected() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        req.advance(PathState::Queued).unwrap();
        assert!(req.advance(PathState::Queued).is_err());
    }

    #[test]
    fn moving_backwards_is_rejected() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        req.advance(PathState::Queued).unwrap();
        req.advance(PathState::Processing).unwrap();
        assert!(req.advance(PathState::Queued).is_err());
    }

    #[test]
    fn returned_is_terminal() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        req.advance(PathState::Queued).unwrap();
        req.advance(PathState::Processing).unwrap();
        req.advance(PathState::ReturnQueued).unwrap();
        req.advance(PathState::Returned).unwrap();
        assert!(req.advance(PathState::Returned).is_err());
    }

    #[test]
    fn fail_accumulates_messages() {
        let mut req = PathRequest::new(Int3::new(0, 0, 0), Int3::new(1000, 0, 0));
        req.fail("first problem");
        req.fail("second problem");
        assert!(req.is_error());
        assert_eq!(req.error_log, "first problem\nsecond problem");
    }
}
