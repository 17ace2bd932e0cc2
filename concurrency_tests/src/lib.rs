// Test-only fixtures for engine concurrency integration tests.
//
// Builds real `GraphStore` grids and real `Engine` instances in both
// execution modes so the tests exercise the same code paths the library's
// users do: submit → search → deliver, graph mutation batches, shutdown.
// The only test-specific code here is the grid builders and the blocking
// helpers with timeouts.
//
// See also: `tests/engine_pipeline.rs` for the scenarios.

use std::time::{Duration, Instant};

use waymark_engine::{Engine, EngineConfig, PathLog, PathOutcome, ThreadCount};
use waymark_graph::{GraphStore, Int3, NodeIndex};

/// Grid spacing in `Int3` sub-units; one world unit between neighbors.
pub const SPACING: i32 = 1000;

/// Upper bound on any blocking wait in these tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// World position of grid cell (x, z).
pub fn at(x: i32, z: i32) -> Int3 {
    Int3::new(x * SPACING, 0, z * SPACING)
}

/// Node index of grid cell (x, z) in a grid of the given width.
pub fn node_at(width: i32, x: i32, z: i32) -> NodeIndex {
    NodeIndex((z * width + x) as u32)
}

/// 4-connected `width` x `depth` grid, symmetric unit-cost edges, cells in
/// `walls` unwalkable. Nodes are added row by row so `node_at` holds.
pub fn build_grid(width: i32, depth: i32, walls: &[(i32, i32)]) -> GraphStore {
    let mut store = GraphStore::new();
    let graph = store.add_graph().unwrap();
    for z in 0..depth {
        for x in 0..width {
            let walkable = !walls.contains(&(x, z));
            store.add_node(graph, at(x, z), walkable).unwrap();
        }
    }
    for z in 0..depth {
        for x in 0..width {
            if x + 1 < width {
                store.connect(node_at(width, x, z), node_at(width, x + 1, z), SPACING as u32);
            }
            if z + 1 < depth {
                store.connect(node_at(width, x, z), node_at(width, x, z + 1), SPACING as u32);
            }
        }
    }
    store
}

fn base_config() -> EngineConfig {
    EngineConfig {
        path_log: PathLog::None,
        min_area_size: 1,
        ..EngineConfig::default()
    }
}

/// Engine with a fixed worker-thread count.
pub fn threaded_engine(workers: u32, store: GraphStore) -> Engine {
    let config = EngineConfig {
        thread_count: ThreadCount::Fixed(workers),
        ..base_config()
    };
    Engine::new(config, store)
}

/// Engine that only makes progress when ticked or waited on.
pub fn cooperative_engine(store: GraphStore) -> Engine {
    let config = EngineConfig {
        thread_count: ThreadCount::None,
        ..base_config()
    };
    Engine::new(config, store)
}

/// Submit one request and block until its outcome is delivered.
pub fn solve(engine: &Engine, start: Int3, end: Int3) -> PathOutcome {
    let request = engine.path_request(start, end);
    let handle = engine.submit(request).expect("submit failed");
    engine.wait_for(&handle).expect("wait_for failed")
}

/// Poll a handle until its outcome appears, driving the engine's delivery
/// side, with a hard timeout so a hang fails instead of wedging the suite.
pub fn wait_with_timeout(engine: &Engine, handle: &waymark_engine::PathHandle) -> PathOutcome {
    let start = Instant::now();
    loop {
        if let Some(outcome) = handle.try_outcome() {
            return outcome;
        }
        assert!(
            start.elapsed() < TEST_TIMEOUT,
            "timed out waiting for path {:?}",
            handle.id()
        );
        engine.update();
        std::thread::sleep(Duration::from_millis(1));
    }
}
