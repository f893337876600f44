//! Configuration system for the simulation.
//!
//! Supports YAML configuration files with sensible defaults. Every tunable
//! named by the simulation lives here rather than as an embedded constant.

use crate::error::ConfigError;
use crate::genetics::TraitBounds;
use crate::neural::CrossoverStrategy;
use crate::terrain::BiomeThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub genome: GenomeConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub flora: FloraConfig,
    #[serde(default)]
    pub fauna: FaunaConfig,
    #[serde(default)]
    pub shelter: ShelterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// World layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Seed for terrain and every stochastic decision
    pub seed: u64,
    /// Half-width of the square region entities are placed in at init
    pub extent: f32,
    /// Half-width of the square region shelters are placed in
    pub shelter_extent: f32,
    /// Radius around the origin used for generation spawn points
    pub spawn_radius: f32,
    pub initial_flora: usize,
    pub initial_fauna: usize,
    pub initial_shelters: usize,
}

/// Day/night cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Seconds of simulated time per day
    pub day_length: f32,
    /// Hour of day (0-24) at which the simulation starts
    pub start_hour: f32,
    /// Night spans [night_start_hour, 24) and [0, night_end_hour)
    pub night_start_hour: f32,
    pub night_end_hour: f32,
    /// Ambient light outside the dawn/day/dusk window
    pub night_light: f32,
    /// Hours over which dawn and dusk ramp the light level
    pub twilight_hours: f32,
    /// Light gained over dawn and lost over dusk
    pub twilight_gain: f32,
}

/// One coherent-noise layer of the height field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseLayerConfig {
    /// Sampling frequency in cycles per world unit
    pub frequency: f64,
    /// Relative contribution to the blended height
    pub amplitude: f64,
    pub octaves: u32,
    pub persistence: f64,
    pub lacunarity: f64,
}

/// Terrain generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Samples per chunk side
    pub chunk_size: usize,
    /// World height for a normalized sample of 1.0
    pub max_height: f32,
    pub mountains: NoiseLayerConfig,
    pub hills: NoiseLayerConfig,
    pub detail: NoiseLayerConfig,
    /// Power applied to normalized heights (> 1 flattens lowlands)
    pub flatten_exponent: f32,
    pub biomes: BiomeThresholds,
}

/// Agent needs, behavior thresholds and lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub max_health: f32,
    pub max_hunger: f32,
    pub initial_hunger: f32,

    /// Hunger lost per second
    pub hunger_decay: f32,
    /// Health lost per second while hunger is exhausted
    pub starvation_damage: f32,
    /// Baseline health lost per second
    pub health_decay: f32,
    /// Extra health decay factor at zero hunger (scales linearly with deficit)
    pub hunger_health_pressure: f32,
    /// Multiplier applied to health decay outdoors at night
    pub night_exposure_multiplier: f32,

    pub stamina_regen: f32,
    pub stamina_drain: f32,
    /// Fraction of `stamina_drain` applied while eating
    pub eating_stamina_factor: f32,
    /// Resting ends once stamina reaches this fraction of max
    pub rest_until_fraction: f32,
    /// Agents start resting below this absolute stamina
    pub tired_stamina: f32,
    /// Agents start seeking food below this hunger
    pub hungry_threshold: f32,
    /// Eating stops at this fraction of max hunger
    pub full_fraction: f32,

    /// Seconds between decision-model consultations
    pub decision_interval: f32,
    /// Max distance a movement intent can place a wander target
    pub max_move: f32,
    pub wander_min_distance: f32,
    pub wander_max_distance: f32,
    pub arrival_distance: f32,
    /// Distance at which a tree can be harvested
    pub eat_range: f32,
    /// Distance at which a shelter can be entered
    pub shelter_range: f32,
    /// Normalization distance for the shelter feature
    pub shelter_search_radius: f32,

    /// Expected harvests per second while eating
    pub harvest_rate: f32,
    pub fruit_hunger_value: f32,

    /// Hunger below which agents hunt fauna
    pub hunt_hunger_threshold: f32,
    /// How strongly the food preference trait skews the flora/fauna
    /// choice. At 0 the nearer food always wins.
    pub food_preference_bias: f32,
    pub hunt_range: f32,
    pub hunt_damage: f32,
    pub hunt_cooldown: f32,

    pub shelter_stamina_regen: f32,
    pub shelter_hunger_regen: f32,

    pub adult_age: f32,
    pub elder_age: f32,
    pub lifespan: f32,
    /// Fractional per-agent jitter on adult/elder age and lifespan
    pub age_jitter: f32,
    pub child_size_factor: f32,
    pub reproduction_cooldown: f32,
    pub reproduction_chance_per_second: f32,
    pub max_population: usize,

    pub fitness_survival_weight: f32,
    pub fitness_gather_weight: f32,
    pub fitness_health_weight: f32,
    /// Hunt kills count as this many fruit toward fitness
    pub fitness_hunt_weight: f32,
}

/// Genome trait ranges and decision-network shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeConfig {
    pub speed: TraitBounds,
    pub size: TraitBounds,
    pub stamina: TraitBounds,
    pub vision_range: TraitBounds,
    pub food_preference: TraitBounds,
    /// Relative magnitude of a trait mutation
    pub trait_mutation_scale: f32,
    /// Hidden layer widths of the decision network
    pub hidden_layers: Vec<usize>,
    /// Initial weights are drawn from +/- this value
    pub initial_weight_range: f32,
}

/// Genetic algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Per-trait mutation probability
    pub trait_mutation_rate: f32,
    /// Per-weight mutation probability
    pub mutation_rate: f32,
    /// Magnitude of weight perturbations
    pub mutation_strength: f32,
    pub elite_fraction: f32,
    pub tournament_size: usize,
    /// Seconds of simulated time per generation
    pub generation_duration: f32,
    /// Population at or below which a generation ends early
    pub collapse_threshold: usize,
    /// Jitter applied once spawn points are exhausted
    pub spawn_jitter: f32,
    /// How parent decision networks are recombined
    pub brain_crossover: CrossoverStrategy,
}

/// Fruit trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloraConfig {
    pub max_fruit: usize,
    /// Seconds until fully grown
    pub growth_time: f32,
    /// Growth stage at which fruit appears
    pub fruiting_stage: f32,
    /// Chance per second of a new fruit
    pub fruit_chance: f32,
    /// Maturity gained per second (ripe at 1.0)
    pub ripen_rate: f32,
    pub max_age: f32,
    /// Chance per second a mature tree seeds a sapling
    pub seed_chance: f32,
    pub seed_cooldown: f32,
    pub seed_radius: f32,
    pub max_flora: usize,
    /// Fraction of initial trees that start fully grown with ripe fruit
    pub initial_mature_fraction: f32,
}

/// Huntable animals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaunaConfig {
    pub threat_range: f32,
    pub flee_duration: f32,
    pub flee_distance: f32,
    pub flee_speed_multiplier: f32,
    pub min_age: f32,
    pub max_age: f32,
    pub reproduction_cooldown: f32,
    /// Chance per second that one animal reproduces
    pub reproduction_chance: f32,
    pub max_fauna: usize,
    /// Max height change a wander target may require
    pub max_climb: f32,
    /// Offspring are placed within this distance of the parent
    pub offspring_radius: f32,
}

/// Houses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelterConfig {
    pub capacity: usize,
}

/// Logging and stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Seconds of simulated time between stats records
    pub stats_interval: f32,
    /// Events retained by the in-memory event buffer
    pub event_buffer: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            extent: 50.0,
            shelter_extent: 40.0,
            spawn_radius: 20.0,
            initial_flora: 20,
            initial_fauna: 15,
            initial_shelters: 5,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            day_length: 120.0,
            start_hour: 8.0,
            night_start_hour: 18.0,
            night_end_hour: 6.0,
            night_light: 0.3,
            twilight_hours: 2.0,
            twilight_gain: 0.4,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            max_height: 30.0,
            mountains: NoiseLayerConfig {
                frequency: 0.004,
                amplitude: 1.0,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            hills: NoiseLayerConfig {
                frequency: 0.015,
                amplitude: 0.5,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            detail: NoiseLayerConfig {
                frequency: 0.06,
                amplitude: 0.15,
                octaves: 2,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            flatten_exponent: 1.2,
            biomes: BiomeThresholds::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            max_hunger: 100.0,
            initial_hunger: 50.0,
            hunger_decay: 0.5,
            starvation_damage: 5.0,
            health_decay: 0.05,
            hunger_health_pressure: 4.0,
            night_exposure_multiplier: 2.0,
            stamina_regen: 10.0,
            stamina_drain: 0.5,
            eating_stamina_factor: 0.5,
            rest_until_fraction: 0.8,
            tired_stamina: 20.0,
            hungry_threshold: 50.0,
            full_fraction: 0.9,
            decision_interval: 2.0,
            max_move: 15.0,
            wander_min_distance: 5.0,
            wander_max_distance: 15.0,
            arrival_distance: 0.5,
            eat_range: 1.5,
            shelter_range: 1.5,
            shelter_search_radius: 50.0,
            harvest_rate: 5.0,
            fruit_hunger_value: 20.0,
            hunt_hunger_threshold: 40.0,
            food_preference_bias: 1.0,
            hunt_range: 1.5,
            hunt_damage: 25.0,
            hunt_cooldown: 1.0,
            shelter_stamina_regen: 5.0,
            shelter_hunger_regen: 0.75,
            adult_age: 100.0,
            elder_age: 500.0,
            lifespan: 800.0,
            age_jitter: 0.15,
            child_size_factor: 0.7,
            reproduction_cooldown: 60.0,
            reproduction_chance_per_second: 0.05,
            max_population: 200,
            fitness_survival_weight: 0.1,
            fitness_gather_weight: 10.0,
            fitness_health_weight: 0.5,
            fitness_hunt_weight: 2.0,
        }
    }
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            speed: TraitBounds::new((0.5, 2.0), (0.1, 3.0)),
            size: TraitBounds::new((0.8, 1.2), (0.5, 2.0)),
            stamina: TraitBounds::new((50.0, 150.0), (10.0, 200.0)),
            vision_range: TraitBounds::new((5.0, 20.0), (3.0, 30.0)),
            food_preference: TraitBounds::new((0.0, 1.0), (0.0, 1.0)),
            trait_mutation_scale: 0.1,
            hidden_layers: vec![32, 16],
            initial_weight_range: 0.5,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            trait_mutation_rate: 0.1,
            mutation_rate: 0.1,
            mutation_strength: 0.1,
            elite_fraction: 0.1,
            tournament_size: 3,
            generation_duration: 600.0,
            collapse_threshold: 2,
            spawn_jitter: 5.0,
            brain_crossover: CrossoverStrategy::Uniform,
        }
    }
}

impl Default for FloraConfig {
    fn default() -> Self {
        Self {
            max_fruit: 10,
            growth_time: 30.0,
            fruiting_stage: 0.5,
            fruit_chance: 0.2,
            ripen_rate: 0.1,
            max_age: 100_000.0,
            seed_chance: 0.002,
            seed_cooldown: 120.0,
            seed_radius: 8.0,
            max_flora: 60,
            initial_mature_fraction: 0.5,
        }
    }
}

impl Default for FaunaConfig {
    fn default() -> Self {
        Self {
            threat_range: 8.0,
            flee_duration: 3.0,
            flee_distance: 15.0,
            flee_speed_multiplier: 1.5,
            min_age: 300.0,
            max_age: 600.0,
            reproduction_cooldown: 120.0,
            reproduction_chance: 0.01,
            max_fauna: 30,
            max_climb: 5.0,
            offspring_radius: 3.0,
        }
    }
}

impl Default for ShelterConfig {
    fn default() -> Self {
        Self { capacity: 2 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval: 10.0,
            event_buffer: 1000,
        }
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Terrain noise parameters are checked again, with a typed error, when
    /// the height field is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.world.extent > 0.0, "world.extent must be > 0")?;
        ensure(self.world.spawn_radius >= 0.0, "world.spawn_radius must be >= 0")?;

        ensure(self.clock.day_length > 0.0, "clock.day_length must be > 0")?;
        ensure(
            (0.0..24.0).contains(&self.clock.start_hour),
            "clock.start_hour must be in [0, 24)",
        )?;
        ensure(
            self.clock.night_end_hour < self.clock.night_start_hour,
            "clock.night_end_hour must precede night_start_hour",
        )?;
        ensure(self.clock.twilight_hours > 0.0, "clock.twilight_hours must be > 0")?;
        ensure(
            self.clock.night_light >= 0.0
                && self.clock.twilight_gain >= 0.0
                && self.clock.night_light + self.clock.twilight_gain <= 1.0,
            "clock light levels must satisfy 0 <= night_light + twilight_gain <= 1",
        )?;

        self.terrain.biomes.validate()?;

        let a = &self.agents;
        ensure(a.max_health > 0.0 && a.max_hunger > 0.0, "agent maxima must be > 0")?;
        ensure(a.decision_interval > 0.0, "agents.decision_interval must be > 0")?;
        ensure(a.max_move > 0.0, "agents.max_move must be > 0")?;
        ensure(
            a.wander_min_distance <= a.wander_max_distance,
            "agents.wander_min_distance must not exceed wander_max_distance",
        )?;
        ensure(
            a.adult_age < a.elder_age && a.elder_age < a.lifespan,
            "agent ages must satisfy adult_age < elder_age < lifespan",
        )?;
        ensure(
            (0.0..0.5).contains(&a.age_jitter),
            "agents.age_jitter must be in [0, 0.5)",
        )?;
        ensure(
            a.child_size_factor > 0.0 && a.child_size_factor <= 1.0,
            "agents.child_size_factor must be in (0, 1]",
        )?;
        ensure(a.night_exposure_multiplier >= 1.0, "night_exposure_multiplier must be >= 1")?;
        ensure(
            (0.0..=1.0).contains(&a.eating_stamina_factor),
            "agents.eating_stamina_factor must be in [0, 1]",
        )?;
        ensure(
            (0.0..=1.0).contains(&a.food_preference_bias),
            "agents.food_preference_bias must be in [0, 1]",
        )?;

        let g = &self.genome;
        for (name, bounds) in [
            ("speed", &g.speed),
            ("size", &g.size),
            ("stamina", &g.stamina),
            ("vision_range", &g.vision_range),
            ("food_preference", &g.food_preference),
        ] {
            if !bounds.is_consistent() {
                return Err(ConfigError::Invalid(format!(
                    "genome.{name}: init range must lie within clamp range"
                )));
            }
        }
        ensure(g.trait_mutation_scale >= 0.0, "genome.trait_mutation_scale must be >= 0")?;
        ensure(
            g.hidden_layers.iter().all(|&w| w > 0),
            "genome.hidden_layers widths must be > 0",
        )?;

        let e = &self.evolution;
        ensure(e.population_size > 0, "evolution.population_size must be > 0")?;
        ensure(
            (0.0..=1.0).contains(&e.elite_fraction),
            "evolution.elite_fraction must be in [0, 1]",
        )?;
        ensure(e.tournament_size > 0, "evolution.tournament_size must be > 0")?;
        ensure(
            (0.0..=1.0).contains(&e.mutation_rate) && (0.0..=1.0).contains(&e.trait_mutation_rate),
            "evolution mutation rates must be in [0, 1]",
        )?;
        ensure(e.generation_duration > 0.0, "evolution.generation_duration must be > 0")?;
        ensure(
            e.population_size <= a.max_population,
            "evolution.population_size cannot exceed agents.max_population",
        )?;

        ensure(self.flora.growth_time > 0.0, "flora.growth_time must be > 0")?;
        ensure(self.fauna.min_age <= self.fauna.max_age, "fauna.min_age must not exceed max_age")?;
        ensure(self.fauna.offspring_radius >= 0.0, "fauna.offspring_radius must be >= 0")?;
        ensure(self.shelter.capacity > 0, "shelter.capacity must be > 0")?;
        ensure(self.logging.stats_interval > 0.0, "logging.stats_interval must be > 0")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.world.seed, loaded.world.seed);
        assert_eq!(config.genome.hidden_layers, loaded.genome.hidden_layers);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let loaded: Config = serde_yaml::from_str("world:\n  seed: 7\n  extent: 10.0\n  shelter_extent: 5.0\n  spawn_radius: 3.0\n  initial_flora: 1\n  initial_fauna: 0\n  initial_shelters: 1\n").unwrap();
        assert_eq!(loaded.world.seed, 7);
        assert_eq!(loaded.shelter.capacity, 2);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_invalid_ages_rejected() {
        let mut config = Config::default();
        config.agents.elder_age = config.agents.adult_age;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_behavior_tunables_validated() {
        let mut config = Config::default();
        config.clock.twilight_gain = 0.9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.clock.twilight_hours = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agents.eating_stamina_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fauna.offspring_radius = -1.0;
        assert!(config.validate().is_err());

        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded.fauna.offspring_radius, 3.0);
        assert_eq!(loaded.agents.eating_stamina_factor, 0.5);
        assert_eq!(loaded.clock.twilight_gain, 0.4);
    }

    #[test]
    fn test_inconsistent_trait_bounds_rejected() {
        let mut config = Config::default();
        config.genome.speed = TraitBounds::new((0.5, 5.0), (0.1, 3.0));
        assert!(config.validate().is_err());
    }
}
