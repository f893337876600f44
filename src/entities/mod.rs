//! World entities and the handles they use to refer to one another.
//!
//! Entities never hold references to each other. Agents point at shelters
//! by [`ShelterId`] (an index into the world's shelter list) and shelters
//! record occupants by [`AgentId`].

pub mod agent;
pub mod fauna;
pub mod flora;
pub mod shelter;

pub use agent::{Agent, AgentState, DeathCause, LifeStage, Milestone, TickContext};
pub use fauna::{Fauna, FaunaSpecies, SpeciesStats};
pub use flora::{Flora, FloraSpecies};
pub use shelter::Shelter;

use crate::terrain::HeightField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique agent identifier, never reused within a world
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique flora identifier
pub type FloraId = u64;

/// Unique fauna identifier
pub type FaunaId = u64;

/// Index into the world's shelter list. Shelters are never removed, so
/// handles stay valid for the life of the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShelterId(pub usize);

/// Monotonic agent id source
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after `last` (e.g. after agents were created elsewhere)
    pub fn starting_after(last: u64) -> Self {
        Self { next: last + 1 }
    }

    pub fn next_id(&mut self) -> AgentId {
        let id = AgentId(self.next);
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// World-space position. `y` is always derived from terrain height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Position on the terrain surface at (x, z)
    pub fn on_terrain(x: f32, z: f32, terrain: &HeightField) -> Self {
        Self {
            x,
            y: terrain.height(x, z),
            z,
        }
    }

    /// Horizontal distance, ignoring height
    #[inline]
    pub fn distance_xz(&self, x: f32, z: f32) -> f32 {
        let dx = x - self.x;
        let dz = z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    #[inline]
    pub fn distance_to(&self, other: &Position) -> f32 {
        self.distance_xz(other.x, other.z)
    }

    /// Move up to `max_step` toward (x, z). Returns true once within
    /// `arrival` of the target.
    pub fn step_toward(&mut self, x: f32, z: f32, max_step: f32, arrival: f32) -> bool {
        let distance = self.distance_xz(x, z);
        if distance <= arrival {
            return true;
        }
        if max_step >= distance {
            self.x = x;
            self.z = z;
            return true;
        }
        let scale = max_step / distance;
        self.x += (x - self.x) * scale;
        self.z += (z - self.z) * scale;
        false
    }

    /// Re-derive `y` from the terrain
    #[inline]
    pub fn snap(&mut self, terrain: &HeightField) {
        self.y = terrain.height(self.x, self.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_toward_arrives() {
        let mut p = Position::new(0.0, 0.0, 0.0);
        assert!(!p.step_toward(10.0, 0.0, 4.0, 0.5));
        assert!((p.x - 4.0).abs() < 1e-6);
        assert!(!p.step_toward(10.0, 0.0, 4.0, 0.5));
        assert!(p.step_toward(10.0, 0.0, 4.0, 0.5));
        assert_eq!((p.x, p.z), (10.0, 0.0));
    }

    #[test]
    fn test_id_allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(IdAllocator::starting_after(b.0).next_id(), AgentId(b.0 + 1));
    }
}
