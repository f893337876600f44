//! # HEARTHWILD
//!
//! Artificial-life sandbox: procedurally generated terrain populated with
//! agents that get hungry and tired, shelter at night, pair up in shelters
//! and are bred across generations by a genetic algorithm over both their
//! traits and a small decision network.
//!
//! ## Features
//!
//! - **Chunked terrain**: deterministic, seamless height field with a
//!   memoized chunk cache and parallel pre-generation via Rayon
//! - **Needs-driven agents**: hunger, stamina, health, life stages and a
//!   day/night cycle
//! - **Evolvable**: trait crossover plus decision-network recombination
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: seeded random number generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearthwild::{Config, EvolutionEngine, World};
//!
//! let config = Config::default();
//! let mut engine = EvolutionEngine::from_config(&config);
//! let mut world = World::new(config).unwrap();
//!
//! for _ in 0..10_000 {
//!     world.update_with_evolution(0.1, &mut engine).unwrap();
//! }
//!
//! println!("Population: {}", world.population());
//! println!("Generation: {}", world.generation());
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use hearthwild::Config;
//!
//! let mut config = Config::default();
//! config.evolution.population_size = 30;
//! config.evolution.mutation_rate = 0.05;
//! assert!(config.validate().is_ok());
//! ```

pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod evolution;
pub mod genetics;
pub mod neural;
pub mod stats;
pub mod terrain;
pub mod world;

// Re-export main types
pub use config::Config;
pub use entities::{Agent, AgentId, AgentState, LifeStage};
pub use error::{ConfigError, ModelError, SimError, TerrainError};
pub use events::{EventBuffer, EventSink, LogSink, SimEvent};
pub use evolution::EvolutionEngine;
pub use neural::{DecisionHook, DecisionModel, RuleBasedReasoner};
pub use terrain::HeightField;
pub use world::World;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark: `seconds` of simulated time at `dt` per tick
pub fn benchmark(seconds: f32, dt: f32, population: usize) -> Result<BenchmarkResult, SimError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.evolution.population_size = population;
    config.agents.max_population = config.agents.max_population.max(population * 2);

    let mut engine = EvolutionEngine::from_config(&config);
    let mut world = World::new(config)?;

    let steps = (seconds / dt).round().max(0.0) as u64;
    let start = Instant::now();
    for _ in 0..steps {
        world.update_with_evolution(dt, &mut engine)?;
    }
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        steps,
        initial_population: population,
        final_population: world.population(),
        elapsed_secs: elapsed.as_secs_f64(),
        ticks_per_second: steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        generation: world.generation(),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
    pub generation: u32,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Ticks: {}", self.steps)?;
        writeln!(f, "Population: {} -> {}", self.initial_population, self.final_population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        writeln!(f, "Generation: {}", self.generation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_simulation() {
        let mut world = World::new(Config::default()).unwrap();
        world.run(10.0, 0.1);
        assert!((world.time() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(5.0, 0.1, 10).unwrap();
        assert_eq!(result.steps, 50);
        assert!(result.ticks_per_second > 0.0);
    }
}
