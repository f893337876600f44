//! HEARTHWILD - CLI Entry Point
//!
//! Headless artificial-life sandbox.

use clap::{Parser, Subcommand};
use hearthwild::{benchmark, Config, EvolutionEngine, LogSink, RuleBasedReasoner, World};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "hearthwild")]
#[command(version)]
#[command(about = "Artificial-life sandbox with needs-driven agents and evolving decision networks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Simulated seconds to run
        #[arg(short, long, default_value = "3600")]
        seconds: f32,

        /// Seconds per tick
        #[arg(long, default_value = "0.1")]
        dt: f32,

        /// Output directory for the stats history
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Drive agents with fixed priority rules instead of their networks
        #[arg(long)]
        rules: bool,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Simulated seconds
        #[arg(short, long, default_value = "600")]
        seconds: f32,

        /// Population size
        #[arg(short, long, default_value = "50")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Print a biome map of the terrain around a point
    Terrain {
        /// Terrain seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Map width and height in characters
        #[arg(long, default_value = "64")]
        size: usize,

        /// World units per character
        #[arg(long, default_value = "4.0")]
        scale: f32,

        /// Map center
        #[arg(long, default_value = "0.0")]
        x: f32,
        #[arg(long, default_value = "0.0")]
        z: f32,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if !matches!(cli.command, Commands::Run { .. }) {
        init_logging("info");
    }

    match cli.command {
        Commands::Run {
            config,
            seconds,
            dt,
            output,
            seed,
            rules,
            quiet,
        } => run_simulation(config, seconds, dt, output, seed, rules, quiet),

        Commands::Benchmark { seconds, population } => run_benchmark(seconds, population),

        Commands::Init { output } => generate_config(output),

        Commands::Terrain {
            seed,
            size,
            scale,
            x,
            z,
        } => print_terrain(seed, size, scale, x, z),
    }
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        println!("Loading config from: {:?}", path);
        Ok(Config::from_file(path)?)
    } else {
        println!("Using default configuration");
        Ok(Config::default())
    }
}

fn run_simulation(
    config_path: PathBuf,
    seconds: f32,
    dt: f32,
    output: PathBuf,
    seed: Option<u64>,
    rules: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&config_path)?;
    init_logging(&config.logging.log_level);
    if let Some(s) = seed {
        config.world.seed = s;
    }

    std::fs::create_dir_all(&output)?;

    let mut engine = EvolutionEngine::from_config(&config);
    let mut world = World::new(config.clone())?;
    world.add_sink(Box::new(LogSink));
    if rules {
        world.set_hook(Box::new(RuleBasedReasoner::default()));
    }

    println!("Starting simulation");
    println!("  Seed: {}", config.world.seed);
    println!("  Initial population: {}", world.population());
    println!("  Duration: {}s at dt={}", seconds, dt);
    println!();

    let start = Instant::now();
    let steps = (seconds / dt).round().max(0.0) as u64;
    let mut next_report = 0.0;

    for _ in 0..steps {
        world.update_with_evolution(dt, &mut engine)?;

        // Stats output
        if !quiet && world.time() >= next_report {
            println!("{}", world.stats.summary());
            next_report = world.time() + config.logging.stats_interval as f64;
        }
    }

    let elapsed = start.elapsed();

    println!();
    println!("=== Simulation Complete ===");
    println!("Wall time: {:.2}s", elapsed.as_secs_f64());
    println!("Simulated: {:.0}s ({} days)", world.time(), world.day_number());
    println!(
        "Speed: {:.1} ticks/s",
        steps as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("Final population: {}", world.population());
    println!("Generation: {}", world.generation());

    let stats_path = output.join("stats_history.json");
    world.stats_history.save(&stats_path.to_string_lossy())?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

fn run_benchmark(seconds: f32, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== HEARTHWILD Benchmark ===");
    println!("Simulated seconds: {}", seconds);
    println!("Population: {}", population);
    println!();

    let result = benchmark(seconds, 0.1, population)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn print_terrain(
    seed: u64,
    size: usize,
    scale: f32,
    cx: f32,
    cz: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.world.seed = seed;
    let world = World::empty(config)?;

    let half = size as f32 * scale / 2.0;
    world.prefetch_area(half + cx.abs().max(cz.abs()));

    for row in 0..size {
        let z = cz - half + row as f32 * scale;
        let line: String = (0..size)
            .map(|col| {
                let x = cx - half + col as f32 * scale;
                world.biome_at(x, z).glyph()
            })
            .collect();
        println!("{line}");
    }
    Ok(())
}
