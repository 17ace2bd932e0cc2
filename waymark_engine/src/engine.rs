// The engine: submit, schedule, mutate, deliver.
//
// `Engine` is an explicit context object; nothing here is a global. It owns
// the graph behind a `RwLock`, a FIFO of pending requests, the scheduler,
// and the delivery side of the results channel.
//
// Data flow for one request:
//
//   submit (Created -> Queued, consumer thread)
//     -> queue -> scheduler (Queued -> Processing -> ReturnQueued,
//        searching thread)
//     -> results channel -> deliver (ReturnQueued -> Returned, consumer
//        thread: logging, callback, handle slot)
//
// Results are delivered in completion order, not submission order.
//
// Graph mutations never race searches: queued `GraphUpdate`s are applied
// in batches under the graph write lock, which in-flight searches yield to
// at their next time slice (see `scheduler.rs` for the safe-point
// protocol), with one flood fill per batch when connectivity changed.
//
// Teardown: `shutdown` (also run on drop) flips the accept flag, fails
// everything still queued, interrupts in-flight searches at their next
// time slice, joins the workers, and delivers whatever finished. Waiters
// never hang: `wait_for` notices a dead worker pool.
//
// See also: `path.rs` for the request lifecycle, `config.rs` for the knobs
// read here.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use waymark_graph::{
    FloodFillStats, GraphStore, GraphUpdate, Int3, NearestNode, NnConstraint, flood_fill,
    nearest_node,
};

use crate::config::{EngineConfig, PathLog};
use crate::error::EngineError;
use crate::event::EngineEvent;
use crate::path::{PathHandle, PathId, PathOutcome, PathRequest, PathState};
use crate::scheduler::{CooperativeScheduler, Scheduler, ThreadedScheduler};

/// `wait_for` nesting depth at which a reentrancy warning is logged. A
/// callback that blocks on another path is one miscue away from deadlock.
const WAIT_DEPTH_WARNING: u32 = 5;

/// How long a blocked `wait_for` waits on the results channel before
/// re-checking the handle slot.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// State shared between the engine and its searching threads.
pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) graph: RwLock<GraphStore>,
    pub(crate) queue: Mutex<VecDeque<PathRequest>>,
    pub(crate) queue_cond: Condvar,
    /// Cleared exactly once, at shutdown. Searches abort at their next
    /// time slice once this is false.
    pub(crate) accept_requests: AtomicBool,
    /// Bumped when the 16-bit request-id counter wraps; invalidates every
    /// worker's search stamps (see `run_data.rs`).
    pub(crate) stamp_epoch: AtomicU32,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EngineShared {
    pub(crate) fn publish(&self, event: EngineEvent) {
        self.subscribers.lock().retain(|s| s.send(event).is_ok());
    }
}

/// A pathfinding engine over one `GraphStore`.
pub struct Engine {
    shared: Arc<EngineShared>,
    scheduler: Box<dyn Scheduler>,
    results: Mutex<Receiver<PathRequest>>,
    pending_updates: Mutex<Vec<GraphUpdate>>,
    /// Stats from the most recent flood fill, for `area_count`.
    last_fill: Mutex<FloodFillStats>,
    next_id: AtomicU16,
    wait_depth: AtomicU32,
}

impl Engine {
    /// Build an engine over `graph`. Runs an initial flood fill and starts
    /// the scheduler chosen by the config.
    pub fn new(config: EngineConfig, mut graph: GraphStore) -> Self {
        let stats = flood_fill(&mut graph, config.min_area_size);
        log::info!(
            "engine starting: {} nodes in {} graphs, {} areas ({} small)",
            graph.node_count(),
            graph.graph_count(),
            stats.area_count,
            stats.small_areas
        );

        let workers = config.thread_count.resolve();
        let shared = Arc::new(EngineShared {
            config,
            graph: RwLock::new(graph),
            queue: Mutex::new(VecDeque::new()),
            queue_cond: Condvar::new(),
            accept_requests: AtomicBool::new(true),
            stamp_epoch: AtomicU32::new(0),
            subscribers: Mutex::new(Vec::new()),
        });

        let (results_tx, results_rx) = mpsc::channel();
        let scheduler: Box<dyn Scheduler> = if workers > 0 {
            Box::new(ThreadedScheduler::start(shared.clone(), results_tx, workers))
        } else {
            Box::new(CooperativeScheduler::new(shared.clone(), results_tx))
        };

        Self {
            shared,
            scheduler,
            results: Mutex::new(results_rx),
            pending_updates: Mutex::new(Vec::new()),
            last_fill: Mutex::new(stats),
            next_id: AtomicU16::new(1),
            wait_depth: AtomicU32::new(0),
        }
    }

    /// A request seeded with this engine's default heuristic.
    pub fn path_request(&self, start: Int3, end: Int3) -> PathRequest {
        PathRequest::new(start, end).with_heuristic(
            self.shared.config.heuristic,
            self.shared.config.heuristic_scale,
        )
    }

    /// Queue a request for calculation. Fails fast once shutdown has begun.
    pub fn submit(&self, mut request: PathRequest) -> Result<PathHandle, EngineError> {
        if !self.shared.accept_requests.load(Ordering::Acquire) {
            return Err(EngineError::NotAccepted);
        }
        request.id = self.next_path_id();
        request.advance(PathState::Queued)?;
        let handle = PathHandle::new(request.id, request.slot.clone());
        self.shared.queue.lock().push_back(request);
        self.shared.queue_cond.notify_one();
        Ok(handle)
    }

    fn next_path_id(&self) -> PathId {
        loop {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
            if raw == 0 {
                // The 16-bit counter wrapped. Old stamps in worker scratch
                // could collide with reissued ids; bump the epoch so every
                // worker resets at its next search.
                self.shared.stamp_epoch.fetch_add(1, Ordering::Release);
                log::debug!("path id counter wrapped; search stamps invalidated");
                self.shared.publish(EngineEvent::StampEpochReset);
                continue;
            }
            return PathId(raw);
        }
    }

    /// Per-frame housekeeping: advance cooperative work, deliver finished
    /// paths, apply any queued graph updates.
    pub fn update(&self) {
        self.scheduler.tick();
        self.process_results();
        if !self.pending_updates.lock().is_empty() {
            self.flush_updates();
        }
    }

    /// Deliver every finished request waiting in the results channel.
    /// Must be called from the consumer side (callbacks run here). Returns
    /// the number delivered.
    pub fn process_results(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.results.lock().try_recv();
            match next {
                Ok(request) => {
                    self.deliver(request);
                    delivered += 1;
                }
                Err(_) => return delivered,
            }
        }
    }

    fn deliver(&self, mut request: PathRequest) {
        if let Err(err) = request.advance(PathState::Returned) {
            log::error!("delivering request {:?}: {err}", request.id());
            request.fail(&err.to_string());
        }
        self.log_path(&request);
        if let Some(callback) = request.callback.take() {
            callback(&request);
        }
        let outcome = request.outcome();
        let slot = request.slot.clone();
        *slot.outcome.lock() = Some(outcome);
        slot.ready.notify_all();
    }

    fn log_path(&self, request: &PathRequest) {
        let path_log = self.shared.config.path_log;
        if path_log == PathLog::None {
            return;
        }
        if request.is_error() {
            log::error!("path {:?} failed: {}", request.id(), request.error_log);
            return;
        }
        match path_log {
            PathLog::Normal => log::info!(
                "path {:?} {:?}: {} nodes, cost {}",
                request.id(),
                request.complete_state(),
                request.nodes.len(),
                request.cost
            ),
            PathLog::Heavy => log::info!(
                "path {:?} {:?}: {} nodes, cost {}, {} iterations, {} expanded, {:?}",
                request.id(),
                request.complete_state(),
                request.nodes.len(),
                request.cost,
                request.stats.iterations,
                request.stats.expanded,
                request.stats.duration
            ),
            PathLog::None | PathLog::OnlyErrors => {}
        }
    }

    /// Block until `handle`'s request has been delivered.
    ///
    /// In cooperative mode this drives the scheduler itself. Nesting this
    /// call (a path callback waiting on another path) is legal but logged
    /// once it gets suspicious.
    pub fn wait_for(&self, handle: &PathHandle) -> Result<PathOutcome, EngineError> {
        let depth = self.wait_depth.fetch_add(1, Ordering::Relaxed) + 1;
        if depth >= WAIT_DEPTH_WARNING {
            log::warn!(
                "wait_for nested {depth} levels deep; a path callback is likely waiting on another path"
            );
        }
        let result = self.wait_for_inner(handle);
        self.wait_depth.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn wait_for_inner(&self, handle: &PathHandle) -> Result<PathOutcome, EngineError> {
        loop {
            if let Some(outcome) = handle.try_outcome() {
                return Ok(outcome);
            }
            if self.scheduler.is_threaded() {
                let next = self.results.lock().recv_timeout(WAIT_POLL);
                match next {
                    Ok(request) => self.deliver(request),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        // Every worker has exited. One last look at the
                        // slot in case delivery raced us.
                        if let Some(outcome) = handle.try_outcome() {
                            return Ok(outcome);
                        }
                        return Err(EngineError::WorkersStopped);
                    }
                }
            } else {
                self.scheduler.tick();
                self.process_results();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Graph access and mutation
    // -----------------------------------------------------------------------

    /// Queue a mutation. Applied at the next `flush_updates` (or `update`).
    pub fn queue_update(&self, update: GraphUpdate) {
        self.pending_updates.lock().push(update);
    }

    /// Apply every queued update as one batch at a safe point. Flood fills
    /// once if any update changed connectivity. When this returns, every
    /// later-submitted request sees the mutated graph; a search that was
    /// mid-flight observes the batch at its next time slice.
    ///
    /// Returns the applied updates (holding rollback snapshots for the
    /// tracked ones).
    pub fn flush_updates(&self) -> Vec<GraphUpdate> {
        let mut batch: Vec<GraphUpdate> = std::mem::take(&mut *self.pending_updates.lock());
        if batch.is_empty() {
            return batch;
        }
        let needs_fill = batch.iter().any(|u| u.requires_flood_fill);

        self.scheduler.drain();
        {
            let mut graph = self.shared.graph.write();
            for update in &mut batch {
                update.apply(&mut graph);
            }
            if needs_fill {
                self.refill(&mut graph);
            }
        }
        self.shared.publish(EngineEvent::GraphsUpdated {
            flood_filled: needs_fill,
        });
        batch
    }

    /// Undo a tracked update at a safe point.
    pub fn revert_update(&self, update: &GraphUpdate) {
        self.scheduler.drain();
        {
            let mut graph = self.shared.graph.write();
            update.revert(&mut graph);
            if update.requires_flood_fill {
                self.refill(&mut graph);
            }
        }
        self.shared.publish(EngineEvent::GraphsUpdated {
            flood_filled: update.requires_flood_fill,
        });
    }

    /// Register a new graph at a safe point. Returns its index.
    pub fn add_graph(&self) -> Result<u32, EngineError> {
        self.scheduler.drain();
        let index = self.shared.graph.write().add_graph()?;
        self.shared.publish(EngineEvent::GraphsUpdated {
            flood_filled: false,
        });
        Ok(index)
    }

    /// Remove a graph and its nodes at a safe point. Surviving nodes are
    /// renumbered and areas are relabeled before any search resumes.
    pub fn remove_graph(&self, graph: u32) -> Result<(), EngineError> {
        self.scheduler.drain();
        {
            let mut store = self.shared.graph.write();
            store.remove_graph(graph)?;
            self.refill(&mut store);
        }
        self.shared.publish(EngineEvent::GraphsUpdated { flood_filled: true });
        Ok(())
    }

    /// Arbitrary structural edits (add/remove nodes, connections) at a safe
    /// point. The caller is responsible for `flood_fill` after edits that
    /// change connectivity.
    pub fn edit_graph<R>(&self, edit: impl FnOnce(&mut GraphStore) -> R) -> R {
        self.scheduler.drain();
        let mut graph = self.shared.graph.write();
        edit(&mut graph)
    }

    /// Relabel all areas now, at a safe point.
    pub fn flood_fill(&self) -> FloodFillStats {
        self.scheduler.drain();
        let mut graph = self.shared.graph.write();
        self.refill(&mut graph)
    }

    /// Run a flood fill on an already write-locked graph and record its
    /// stats for `area_count`.
    fn refill(&self, graph: &mut GraphStore) -> FloodFillStats {
        let stats = flood_fill(graph, self.shared.config.min_area_size);
        *self.last_fill.lock() = stats;
        self.shared.publish(EngineEvent::FloodFillCompleted(stats));
        stats
    }

    pub fn nearest_node(&self, position: Int3, constraint: &NnConstraint) -> Option<NearestNode> {
        let graph = self.shared.graph.read();
        nearest_node(
            &graph,
            position,
            constraint,
            self.shared.config.max_nearest_distance,
        )
    }

    /// Whether a path could exist between the nodes nearest these two
    /// points, in O(nodes): resolves both and compares area labels.
    pub fn is_reachable(&self, from: Int3, to: Int3) -> bool {
        let graph = self.shared.graph.read();
        let constraint = NnConstraint::default();
        let max = self.shared.config.max_nearest_distance;
        let Some(a) = nearest_node(&graph, from, &constraint, max) else {
            return false;
        };
        let Some(b) = nearest_node(&graph, to, &constraint, max) else {
            return false;
        };
        graph.is_area_reachable(a.node, b.node)
    }

    pub fn node_count(&self) -> usize {
        self.shared.graph.read().node_count()
    }

    /// Regular areas labeled by the most recent flood fill (the shared
    /// small-island id does not count).
    pub fn area_count(&self) -> u32 {
        self.last_fill.lock().area_count
    }

    // -----------------------------------------------------------------------
    // Events and teardown
    // -----------------------------------------------------------------------

    /// Subscribe to engine events. The subscription ends when the receiver
    /// is dropped.
    pub fn subscribe(&self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Stop accepting requests, fail everything still queued, interrupt
    /// in-flight searches at their next time slice, join the workers, and
    /// deliver whatever finished. Safe to call more than once.
    pub fn shutdown(&self) {
        let was_accepting = self.shared.accept_requests.swap(false, Ordering::AcqRel);
        if was_accepting {
            log::info!("engine shutting down");
        }
        self.shared.queue_cond.notify_all();

        let drained: Vec<PathRequest> = self.shared.queue.lock().drain(..).collect();
        for mut request in drained {
            request.fail("engine shut down before the search started");
            let _ = request.advance(PathState::Processing);
            let _ = request.advance(PathState::ReturnQueued);
            self.deliver(request);
        }

        self.scheduler.shutdown();
        self.process_results();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
