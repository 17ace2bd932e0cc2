// A* search over the shared node arena.
//
// The search runs in three phases driven by a scheduler:
// - `prepare` resolves the request's endpoints. The end node is constrained
//   to the start node's flood-fill area, so an unreachable target fails
//   here in O(nodes) without expanding anything.
// - `initialize` stamps the worker's scratch for this search and seeds the
//   open list with the start node.
// - `step` runs the main loop until done or a deadline passes. It is
//   resumable: all state lives in the request and the worker's `RunData`,
//   so a yielded search continues exactly where it stopped.
//
// Duplicate open-list entries stand in for decrease-key; an entry whose g
// is worse than the node's current record is stale and skipped. Cost
// arithmetic is checked; an overflow marks the request as an error rather
// than wrapping into a bogus shortest path.
//
// See also: `heap.rs` for the pop order (including the deterministic
// tie-break), `run_data.rs` for the generation-stamped node records.
//
// **Critical constraint: determinism.** Given the same graph and request,
// every scheduler mode and thread count must produce the same path. The
// loop reads only the graph, the request, and its own scratch.

use std::time::Instant;

use waymark_graph::{GraphStore, NnConstraint, Node, NodeIndex, nearest_node};

use crate::config::EngineConfig;
use crate::heap::HeapEntry;
use crate::path::{CompleteState, PathRequest};
use crate::run_data::{NO_PARENT, NodeRun, RunData};

/// How many pops happen between deadline checks. Checking the clock every
/// iteration costs more than the iterations themselves.
const DEADLINE_CHECK_INTERVAL: u32 = 64;

/// What a time slice ended with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The deadline passed; call `step` again to continue.
    Yielded,
    /// The search finished. The request's complete state says how.
    Done,
}

/// Resolve the request's endpoints. On failure the request is marked as an
/// error and the later phases must be skipped.
pub(crate) fn prepare(req: &mut PathRequest, graph: &GraphStore, config: &EngineConfig) {
    let Some(start) = nearest_node(graph, req.start, &req.nn_constraint, config.max_nearest_distance)
    else {
        req.fail("no suitable node near the start point");
        return;
    };

    // Pin the end node to the start's area: if no candidate exists there,
    // the target is unreachable and no search work is spent on it.
    let end_constraint = NnConstraint {
        constrain_area: true,
        area: graph.node(start.node).flags.area(),
        ..req.nn_constraint
    };
    let Some(end) = nearest_node(graph, req.end, &end_constraint, config.max_nearest_distance)
    else {
        req.fail("no suitable node near the end point in the start node's area");
        return;
    };

    req.start_node = Some(start);
    req.end_node = Some(end);
}

/// Stamp the scratch for this search and seed the open list.
pub(crate) fn initialize(req: &mut PathRequest, run: &mut RunData, graph: &GraphStore, epoch: u32) {
    let (Some(start), Some(end)) = (req.start_node, req.end_node) else {
        req.fail("search initialized before endpoints were resolved");
        return;
    };

    run.begin_search(req.id, graph, epoch);

    let start_pos = graph.node(start.node).position;
    let end_pos = graph.node(end.node).position;
    let h = req.heuristic.estimate(start_pos, end_pos, req.heuristic_scale);

    run.runs[start.node.index()] = NodeRun {
        g: 0,
        h,
        parent: NO_PARENT,
        search_id: run.search_id(),
    };
    run.open.push(HeapEntry {
        node: start.node,
        f: h,
        g: 0,
    });

    req.best_node = Some(start.node);
    req.best_h = h;
}

fn can_traverse(node: &Node, enabled_tags: u32) -> bool {
    node.flags.walkable() && enabled_tags & (1 << node.flags.tag()) != 0
}

/// Run the main loop until the search finishes or `deadline` passes.
pub(crate) fn step(
    req: &mut PathRequest,
    run: &mut RunData,
    graph: &GraphStore,
    deadline: Instant,
) -> StepOutcome {
    let Some(end) = req.end_node else {
        req.fail("search stepped before endpoints were resolved");
        return StepOutcome::Done;
    };
    let end_pos = graph.node(end.node).position;
    let search_id = run.search_id();
    let mut since_deadline_check = 0u32;

    loop {
        let Some(entry) = run.open.pop() else {
            // Open list exhausted without reaching the target. Hand back a
            // partial path to the closest node seen.
            match req.best_node {
                Some(best) => {
                    trace(req, run, graph, best);
                    req.set_complete(CompleteState::Partial);
                }
                None => req.fail("open list exhausted before the search was seeded"),
            }
            return StepOutcome::Done;
        };

        let current = entry.node;
        let record = run.runs[current.index()];
        if entry.g > record.g {
            // Stale duplicate from before a better path was found.
            continue;
        }
        req.stats.iterations += 1;

        if current == end.node {
            trace(req, run, graph, current);
            req.set_complete(CompleteState::Complete);
            return StepOutcome::Done;
        }

        if record.h < req.best_h {
            req.best_h = record.h;
            req.best_node = Some(current);
        }

        for conn in &graph.node(current).connections {
            let target = graph.node(conn.target);
            if !can_traverse(target, req.enabled_tags) {
                continue;
            }
            req.stats.expanded += 1;

            let tag_penalty = req.tag_penalties[target.flags.tag() as usize & 31];
            let step_cost = conn
                .cost
                .checked_add(target.penalty)
                .and_then(|c| c.checked_add(tag_penalty));
            let Some(step_cost) = step_cost else {
                req.fail("connection cost plus penalties overflowed u32");
                return StepOutcome::Done;
            };
            let Some(tentative) = record.g.checked_add(step_cost) else {
                req.fail("accumulated path cost overflowed u32");
                return StepOutcome::Done;
            };

            let t = conn.target.index();
            let seen = run.runs[t].search_id == search_id;
            if !seen || tentative < run.runs[t].g {
                let h = if seen {
                    run.runs[t].h
                } else {
                    req.heuristic
                        .estimate(target.position, end_pos, req.heuristic_scale)
                };
                run.runs[t] = NodeRun {
                    g: tentative,
                    h,
                    parent: current.0,
                    search_id,
                };
                run.open.push(HeapEntry {
                    node: conn.target,
                    f: tentative.saturating_add(h),
                    g: tentative,
                });
            }
        }

        since_deadline_check += 1;
        if since_deadline_check >= DEADLINE_CHECK_INTERVAL {
            since_deadline_check = 0;
            if Instant::now() >= deadline {
                return StepOutcome::Yielded;
            }
        }
    }
}

/// Walk the parent chain from `target` back to the start and fill the
/// request's result fields.
fn trace(req: &mut PathRequest, run: &RunData, graph: &GraphStore, target: NodeIndex) {
    req.nodes.clear();
    let mut current = target.0;
    loop {
        req.nodes.push(NodeIndex(current));
        let record = run.runs[current as usize];
        if record.parent == NO_PARENT {
            break;
        }
        current = record.parent;
    }
    req.nodes.reverse();
    req.waypoints = req.nodes.iter().map(|&n| graph.node(n).position).collect();
    req.cost = run.runs[target.index()].g;
}
