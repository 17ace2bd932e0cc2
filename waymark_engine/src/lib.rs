// waymark_engine — A* search engine over `waymark_graph` data.
//
// This crate owns the request lifecycle: callers build a `PathRequest`,
// submit it to the `Engine`, and collect a `PathOutcome` through the
// returned handle, a callback, or a blocking wait. Searches run either on
// a pool of worker threads or cooperatively on the caller's thread in
// time slices, selected by `ThreadCount` in the config.
//
// Module overview:
// - `engine.rs`:    The `Engine` facade — submit, delivery, graph mutation
//                   batching, events, shutdown.
// - `scheduler.rs`: Threaded and cooperative execution of the search phases.
// - `search.rs`:    The A* phases themselves (prepare / initialize / step).
// - `heap.rs`:      Binary min-heap open list with a deterministic tie-break.
// - `run_data.rs`:  Per-worker scratch, validity-stamped per search.
// - `path.rs`:      `PathRequest` state machine, handles, outcomes.
// - `config.rs`:    `EngineConfig` — thread count, time slices, logging.
// - `event.rs`:     `EngineEvent` broadcast stream.
// - `error.rs`:     `EngineError`.
//
// **Critical constraint: determinism.** Given the same graph and the same
// request, every scheduler mode returns the same node sequence and cost.
// Ties in the open list break on (f, g, node index), scratch state is
// stamped per search, and no search reads another search's leftovers.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod heap;
pub mod path;
pub mod run_data;
pub mod scheduler;
pub(crate) mod search;

pub use config::{EngineConfig, PathLog, ThreadCount};
pub use engine::Engine;
pub use error::EngineError;
pub use event::EngineEvent;
pub use path::{CompleteState, PathHandle, PathId, PathOutcome, PathRequest, PathState, SearchStats};
pub use scheduler::Scheduler;
