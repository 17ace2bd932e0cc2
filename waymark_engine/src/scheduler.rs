// Search schedulers: threaded worker pool and cooperative single-stepper.
//
// Both modes drive the same three search phases from `search.rs` and feed
// finished requests into the same mpsc return channel, so the engine's
// delivery code does not care which one is running.
//
// - `ThreadedScheduler`: N worker threads. Each blocks on the queue
//   condvar, pops one request, and steps its search one time slice at a
//   time, re-checking the engine's accept flag between slices so shutdown
//   interrupts long searches.
// - `CooperativeScheduler`: no threads. Each `tick` advances the current
//   request by one time slice on the caller's thread; a request can span
//   many ticks.
//
// Safe-point protocol: searches touch the graph only under its read lock,
// taken per time slice and released at every yield. A mutation batch takes
// the write lock, so it waits at most one slice for each in-flight search
// to reach its next yield. Walkability/penalty/tag batches are safe to
// land mid-search; a structural change (node indices reassigned) fails a
// suspended search at its next slice instead of letting it resume over
// stale indices. The cooperative mode has no lock conflict (same thread),
// so its `drain` finishes the in-flight request by hand before a mutation
// runs.
//
// **Critical constraint: workers hold no other lock while holding the
// graph lock.** The queue lock is released before the graph lock is taken
// and vice versa; there is no lock-order cycle.
//
// See also: `search.rs` for the phases, `engine.rs` for submit, delivery,
// and the mutation batching that relies on `drain`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::engine::EngineShared;
use crate::event::EngineEvent;
use crate::path::{PathRequest, PathState};
use crate::run_data::RunData;
use crate::search::{self, StepOutcome};

/// The seam between the engine and its two execution modes.
pub trait Scheduler: Send + Sync {
    /// Advance cooperative work by one time slice. No-op when threaded.
    fn tick(&self);

    /// Finish any in-flight search so a graph mutation can run. No-op when
    /// threaded (workers release the graph lock at every yield, so the
    /// write lock gets in within one time slice).
    fn drain(&self);

    /// Worker threads still running. Cooperative mode reports 1: progress
    /// is always possible as long as the caller keeps ticking.
    fn live_workers(&self) -> usize;

    fn is_threaded(&self) -> bool;

    /// Stop and release execution resources. The engine has already
    /// cleared the accept flag and woken the queue condvar.
    fn shutdown(&self);
}

/// Run one request's search phases to completion, holding the graph read
/// lock for one time slice at a stretch. A writer parked on the graph lock
/// gets in after at most one slice.
fn calculate(shared: &EngineShared, run: &mut RunData, request: &mut PathRequest) {
    let slice = Duration::from_micros(shared.config.max_step_micros.max(1));
    {
        let graph = shared.graph.read();
        let epoch = shared.stamp_epoch.load(Ordering::Acquire);

        search::prepare(request, &graph, &shared.config);
        if request.is_error() {
            return;
        }
        search::initialize(request, run, &graph, epoch);
        if request.is_error() {
            return;
        }
        if search::step(request, run, &graph, Instant::now() + slice) == StepOutcome::Done {
            return;
        }
    }

    loop {
        if !shared.accept_requests.load(Ordering::Acquire) {
            request.fail("engine shut down before the search finished");
            return;
        }
        let graph = shared.graph.read();
        if !run.matches(&graph) {
            // Node indices were reassigned while we were suspended; the
            // open list and parent records describe the old numbering.
            request.fail("graph changed structurally during the search");
            return;
        }
        if search::step(request, run, &graph, Instant::now() + slice) == StepOutcome::Done {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Threaded scheduler
// ---------------------------------------------------------------------------

/// Decrements the live-worker counter when a worker exits, panic included.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct ThreadedScheduler {
    live: Arc<AtomicUsize>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadedScheduler {
    pub(crate) fn start(
        shared: Arc<EngineShared>,
        results: Sender<PathRequest>,
        workers: usize,
    ) -> Self {
        let live = Arc::new(AtomicUsize::new(workers));
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let shared = shared.clone();
            let results = results.clone();
            let live = live.clone();
            handles.push(thread::spawn(move || {
                let _guard = LiveGuard(live);
                worker_loop(shared, results);
            }));
        }
        Self {
            live,
            handles: Mutex::new(handles),
        }
    }
}

impl Scheduler for ThreadedScheduler {
    fn tick(&self) {}

    fn drain(&self) {}

    fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn is_threaded(&self) -> bool {
        true
    }

    fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<EngineShared>, results: Sender<PathRequest>) {
    let mut run = RunData::new();
    loop {
        // Block until there is a request or the engine stops accepting.
        let mut request = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(request) = queue.pop_front() {
                    break request;
                }
                if !shared.accept_requests.load(Ordering::Acquire) {
                    return;
                }
                shared.queue_cond.wait(&mut queue);
            }
        };

        let started = Instant::now();
        shared.publish(EngineEvent::PathPreSearch(request.id()));
        match request.advance(PathState::Processing) {
            Ok(()) => calculate(&shared, &mut run, &mut request),
            Err(err) => {
                log::error!("request {:?} arrived in a bad state: {err}", request.id());
                request.fail(&err.to_string());
            }
        }
        shared.publish(EngineEvent::PathPostSearch(request.id()));
        request.stats.duration = started.elapsed();

        if let Err(err) = request.advance(PathState::ReturnQueued) {
            log::error!("request {:?} could not be return-queued: {err}", request.id());
            request.fail(&err.to_string());
        }
        if results.send(request).is_err() {
            // Delivery side is gone; nothing left to work for.
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Cooperative scheduler
// ---------------------------------------------------------------------------

struct CoopState {
    run: RunData,
    current: Option<PathRequest>,
    started: Option<Instant>,
}

pub struct CooperativeScheduler {
    shared: Arc<EngineShared>,
    results: Sender<PathRequest>,
    state: Mutex<CoopState>,
}

impl CooperativeScheduler {
    pub(crate) fn new(shared: Arc<EngineShared>, results: Sender<PathRequest>) -> Self {
        Self {
            shared,
            results,
            state: Mutex::new(CoopState {
                run: RunData::new(),
                current: None,
                started: None,
            }),
        }
    }

    /// Hand the finished request to the delivery channel.
    fn finish(&self, state: &mut CoopState, mut request: PathRequest) {
        self.shared.publish(EngineEvent::PathPostSearch(request.id()));
        if let Some(started) = state.started.take() {
            request.stats.duration = started.elapsed();
        }
        if let Err(err) = request.advance(PathState::ReturnQueued) {
            log::error!("request {:?} could not be return-queued: {err}", request.id());
            request.fail(&err.to_string());
        }
        let _ = self.results.send(request);
    }
}

impl Scheduler for CooperativeScheduler {
    fn tick(&self) {
        let mut state = self.state.lock();

        // Start the next request if idle.
        if state.current.is_none() {
            let Some(mut request) = self.shared.queue.lock().pop_front() else {
                return;
            };
            state.started = Some(Instant::now());
            self.shared.publish(EngineEvent::PathPreSearch(request.id()));
            match request.advance(PathState::Processing) {
                Ok(()) => {
                    let graph = self.shared.graph.read();
                    let epoch = self.shared.stamp_epoch.load(Ordering::Acquire);
                    search::prepare(&mut request, &graph, &self.shared.config);
                    if !request.is_error() {
                        search::initialize(&mut request, &mut state.run, &graph, epoch);
                    }
                }
                Err(err) => {
                    log::error!("request {:?} arrived in a bad state: {err}", request.id());
                    request.fail(&err.to_string());
                }
            }
            state.current = Some(request);
        }

        // One time slice of the current request.
        let Some(mut request) = state.current.take() else {
            return;
        };
        if request.is_error() {
            self.finish(&mut state, request);
            return;
        }
        let outcome = {
            let graph = self.shared.graph.read();
            let slice = Duration::from_micros(self.shared.config.max_step_micros.max(1));
            search::step(&mut request, &mut state.run, &graph, Instant::now() + slice)
        };
        match outcome {
            StepOutcome::Done => self.finish(&mut state, request),
            StepOutcome::Yielded => state.current = Some(request),
        }
    }

    fn drain(&self) {
        loop {
            {
                let state = self.state.lock();
                if state.current.is_none() {
                    return;
                }
            }
            self.tick();
        }
    }

    fn live_workers(&self) -> usize {
        1
    }

    fn is_threaded(&self) -> bool {
        false
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        if let Some(mut request) = state.current.take() {
            request.fail("engine shut down before the search finished");
            self.finish(&mut state, request);
        }
    }
}
