//! Statistics tracking for the simulation.

use crate::entities::{Agent, AgentState, Fauna, Flora, LifeStage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Statistics snapshot for a simulation step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Simulated seconds
    pub time: f64,
    pub day: u32,
    pub generation: u32,
    /// Living agents
    pub population: usize,
    pub children: usize,
    pub adults: usize,
    pub elders: usize,
    pub sheltered: usize,
    pub health_mean: f32,
    pub hunger_mean: f32,
    pub stamina_mean: f32,
    pub age_mean: f32,
    /// Distinct family names among the living
    pub family_count: usize,
    pub flora_count: usize,
    pub ripe_fruit: usize,
    pub fauna_count: usize,
    /// Births this step
    pub births: usize,
    /// Deaths this step
    pub deaths: usize,
}

impl Stats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from current simulation state
    pub fn update(&mut self, agents: &[Agent], flora: &[Flora], fauna: &[Fauna]) {
        let alive: Vec<&Agent> = agents.iter().filter(|a| a.alive).collect();
        self.population = alive.len();

        if alive.is_empty() {
            self.children = 0;
            self.adults = 0;
            self.elders = 0;
            self.sheltered = 0;
            self.health_mean = 0.0;
            self.hunger_mean = 0.0;
            self.stamina_mean = 0.0;
            self.age_mean = 0.0;
            self.family_count = 0;
        } else {
            let n = alive.len() as f32;
            let count = |stage| alive.iter().filter(|a| a.stage == stage).count();
            self.children = count(LifeStage::Child);
            self.adults = count(LifeStage::Adult);
            self.elders = count(LifeStage::Elder);
            self.sheltered = alive
                .iter()
                .filter(|a| a.state == AgentState::InShelter)
                .count();

            self.health_mean = alive.iter().map(|a| a.health).sum::<f32>() / n;
            self.hunger_mean = alive.iter().map(|a| a.hunger).sum::<f32>() / n;
            self.stamina_mean = alive.iter().map(|a| a.stamina).sum::<f32>() / n;
            self.age_mean = alive.iter().map(|a| a.age).sum::<f32>() / n;

            let families: HashSet<&str> = alive.iter().map(|a| a.name().family.as_str()).collect();
            self.family_count = families.len();
        }

        self.flora_count = flora.iter().filter(|f| f.alive).count();
        self.ripe_fruit = flora.iter().map(Flora::ripe_fruit_count).sum();
        self.fauna_count = fauna.iter().filter(|f| f.alive).count();
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:8.1} | Day:{:3} | Gen:{:3} | Pop:{:4} (c{} a{} e{}) | Shelter:{:3} | HP:{:.0} | Food:{:.0} | Fruit:{:4} | Fauna:{:3}",
            self.time,
            self.day,
            self.generation,
            self.population,
            self.children,
            self.adults,
            self.elders,
            self.sheltered,
            self.health_mean,
            self.hunger_mean,
            self.ripe_fruit,
            self.fauna_count,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval in simulated seconds
    pub interval: f32,
    #[serde(skip)]
    next_record: f64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: f32) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
            next_record: 0.0,
        }
    }

    /// Record a snapshot if the interval has elapsed. Returns true if recorded.
    pub fn maybe_record(&mut self, stats: &Stats) -> bool {
        if stats.time + 1e-9 < self.next_record {
            return false;
        }
        self.snapshots.push(stats.clone());
        self.next_record = stats.time + self.interval as f64;
        true
    }

    /// Record a stats snapshot unconditionally
    pub fn record(&mut self, stats: Stats) {
        self.snapshots.push(stats);
    }

    pub fn latest(&self) -> Option<&Stats> {
        self.snapshots.last()
    }

    /// Get population over time
    pub fn population_series(&self) -> Vec<(f64, usize)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.population))
            .collect()
    }

    /// Get generation over time
    pub fn generation_series(&self) -> Vec<(f64, u32)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.generation))
            .collect()
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
