// Benchmarks for the search hot loop.
//
// Runs the full request pipeline (submit, search, deliver) on a 4-connected
// grid, cooperative mode so the numbers measure the search itself rather
// than thread handoff. The Dijkstra case disables the heuristic to show
// what the estimate buys on the same graph.

use criterion::{Criterion, criterion_group, criterion_main};

use waymark_engine::{Engine, EngineConfig, PathLog, ThreadCount};
use waymark_graph::{GraphStore, Heuristic, Int3};

const SPACING: i32 = 1000;

/// 4-connected `side` x `side` grid with unit-length edges.
fn build_grid(side: i32) -> GraphStore {
    let mut store = GraphStore::new();
    let graph = store.add_graph().unwrap();
    for z in 0..side {
        for x in 0..side {
            store
                .add_node(graph, Int3::new(x * SPACING, 0, z * SPACING), true)
                .unwrap();
        }
    }
    let at = |x: i32, z: i32| waymark_graph::NodeIndex((z * side + x) as u32);
    for z in 0..side {
        for x in 0..side {
            if x + 1 < side {
                store.connect(at(x, z), at(x + 1, z), SPACING as u32);
            }
            if z + 1 < side {
                store.connect(at(x, z), at(x, z + 1), SPACING as u32);
            }
        }
    }
    store
}

fn bench_engine(side: i32, heuristic: Heuristic) -> Engine {
    let config = EngineConfig {
        thread_count: ThreadCount::None,
        path_log: PathLog::OnlyErrors,
        heuristic,
        // Long slices so a bench iteration is one search, not many ticks.
        max_step_micros: 1_000_000,
        min_area_size: 1,
        ..EngineConfig::default()
    };
    Engine::new(config, build_grid(side))
}

fn corner_to_corner(engine: &Engine, side: i32) {
    let far = (side - 1) * SPACING;
    let request = engine.path_request(Int3::new(0, 0, 0), Int3::new(far, 0, far));
    let handle = engine.submit(request).unwrap();
    let outcome = engine.wait_for(&handle).unwrap();
    assert!(outcome.error_log.is_empty(), "{}", outcome.error_log);
}

fn criterion_benchmark(c: &mut Criterion) {
    // Surface path failures without polluting the measurements.
    let _ = env_logger::builder().is_test(true).try_init();

    let mut group = c.benchmark_group("grid_search");

    let engine = bench_engine(64, Heuristic::Euclidean);
    group.bench_function("astar_64x64", |b| b.iter(|| corner_to_corner(&engine, 64)));

    let engine = bench_engine(64, Heuristic::None);
    group.bench_function("dijkstra_64x64", |b| b.iter(|| corner_to_corner(&engine, 64)));

    let engine = bench_engine(128, Heuristic::Euclidean);
    group.bench_function("astar_128x128", |b| {
        b.iter(|| corner_to_corner(&engine, 128))
    });

    group.finish();

    c.bench_function("flood_fill_64x64", |b| {
        let mut store = build_grid(64);
        b.iter(|| waymark_graph::flood_fill(&mut store, 10));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
