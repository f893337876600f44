//! Capacity-bounded houses.

use super::{AgentId, Position, ShelterId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A house agents shelter in at night and pair up in.
///
/// The occupant set is owned here; agents only hold the [`ShelterId`].
/// World keeps both sides consistent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Shelter {
    pub id: ShelterId,
    pub position: Position,
    pub capacity: usize,
    pub built: bool,
    occupants: BTreeSet<AgentId>,
}

impl Shelter {
    pub fn new(id: ShelterId, position: Position, capacity: usize) -> Self {
        Self {
            id,
            position,
            capacity,
            built: true,
            occupants: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.built && self.occupants.len() < self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }

    /// Register an occupant. A full shelter returns false and is left
    /// untouched; re-adding a current occupant succeeds without change.
    pub fn add_occupant(&mut self, agent: AgentId) -> bool {
        if self.occupants.contains(&agent) {
            return true;
        }
        if !self.has_room() {
            return false;
        }
        self.occupants.insert(agent)
    }

    pub fn remove_occupant(&mut self, agent: AgentId) -> bool {
        self.occupants.remove(&agent)
    }

    #[inline]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.occupants.contains(&agent)
    }

    pub fn occupants(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.occupants.iter().copied()
    }

    #[inline]
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn clear_occupants(&mut self) {
        self.occupants.clear();
    }

    #[inline]
    pub fn distance_to(&self, position: &Position) -> f32 {
        self.position.distance_to(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shelter() -> Shelter {
        Shelter::new(ShelterId(0), Position::default(), 2)
    }

    #[test]
    fn test_capacity_enforced() {
        let mut s = shelter();
        assert!(s.add_occupant(AgentId(1)));
        assert!(s.add_occupant(AgentId(2)));
        assert!(s.is_full());

        assert!(!s.add_occupant(AgentId(3)));
        assert_eq!(s.occupant_count(), 2);
        assert!(!s.contains(AgentId(3)));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut s = shelter();
        assert!(s.add_occupant(AgentId(1)));
        assert!(s.add_occupant(AgentId(1)));
        assert_eq!(s.occupant_count(), 1);
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut s = shelter();
        s.add_occupant(AgentId(1));
        s.add_occupant(AgentId(2));
        assert!(s.remove_occupant(AgentId(1)));
        assert!(!s.remove_occupant(AgentId(1)));
        assert!(s.has_room());
        assert!(s.add_occupant(AgentId(3)));
    }

    #[test]
    fn test_unbuilt_shelter_rejects() {
        let mut s = shelter();
        s.built = false;
        assert!(!s.add_occupant(AgentId(1)));
    }
}
