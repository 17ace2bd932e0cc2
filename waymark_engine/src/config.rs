// Data-driven engine configuration.
//
// All tunable engine parameters live here in `EngineConfig`, loaded from
// JSON or built in code. The engine reads from the config instead of using
// magic numbers, so deployments can retune scheduling and query behavior
// without recompilation.
//
// See also: `engine.rs` which owns the config for the life of the engine,
// `scheduler.rs` which resolves `ThreadCount` into worker threads.

use serde::{Deserialize, Serialize};
use waymark_graph::Heuristic;

/// How many worker threads the engine runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadCount {
    /// Derive from the machine's core count.
    Automatic,
    /// No worker threads; searches advance only when the consumer calls
    /// `Engine::update` or `Engine::wait_for`.
    None,
    /// Exactly this many workers.
    Fixed(u32),
}

impl ThreadCount {
    /// Resolve to a concrete worker count. Zero means cooperative mode.
    pub fn resolve(self) -> usize {
        match self {
            ThreadCount::Automatic => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .clamp(1, 8),
            ThreadCount::None => 0,
            ThreadCount::Fixed(n) => n as usize,
        }
    }
}

/// How chatty the engine is about finished paths, through the `log` facade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathLog {
    /// Nothing, not even failures.
    None,
    /// One line per delivered path.
    Normal,
    /// Per-path search statistics (iterations, duration, node counts).
    Heavy,
    /// Only paths that failed.
    OnlyErrors,
}

/// Top-level engine configuration. Never mutated after `Engine::new`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub thread_count: ThreadCount,

    /// Length of one search time slice in microseconds. Workers poll for
    /// shutdown between slices; the cooperative scheduler does one slice
    /// per `update`.
    pub max_step_micros: u64,

    /// Connected components smaller than this share the reserved
    /// small-island area id instead of consuming a regular one.
    pub min_area_size: usize,

    /// Default cap for nearest-node queries, in `Int3` sub-units.
    pub max_nearest_distance: u32,

    /// Heuristic seeded into requests created by `Engine::path_request`.
    pub heuristic: Heuristic,
    pub heuristic_scale: f32,

    pub path_log: PathLog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: ThreadCount::Automatic,
            max_step_micros: 1000,
            min_area_size: 10,
            max_nearest_distance: 100 * waymark_graph::Int3::PRECISION as u32,
            heuristic: Heuristic::Euclidean,
            heuristic_scale: 1.0,
            path_log: PathLog::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.thread_count, restored.thread_count);
        assert_eq!(config.max_step_micros, restored.max_step_micros);
        assert_eq!(config.min_area_size, restored.min_area_size);
        assert_eq!(config.heuristic, restored.heuristic);
    }

    #[test]
    fn config_loads_from_json_string() {
        let json = r#"{
            "thread_count": { "Fixed": 2 },
            "max_step_micros": 500,
            "min_area_size": 4,
            "max_nearest_distance": 50000,
            "heuristic": "DiagonalManhattan",
            "heuristic_scale": 1.2,
            "path_log": "OnlyErrors"
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.thread_count, ThreadCount::Fixed(2));
        assert_eq!(config.heuristic, Heuristic::DiagonalManhattan);
        assert_eq!(config.path_log, PathLog::OnlyErrors);
    }

    #[test]
    fn thread_count_resolution() {
        assert_eq!(ThreadCount::None.resolve(), 0);
        assert_eq!(ThreadCount::Fixed(3).resolve(), 3);
        let auto = ThreadCount::Automatic.resolve();
        assert!((1..=8).contains(&auto));
    }
}
