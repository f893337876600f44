//! Lifecycle events and the sinks that receive them.
//!
//! Sinks are one-way observers: the world never reads anything back, and a
//! sink cannot influence the simulation.

use crate::entities::{AgentId, DeathCause, Milestone, ShelterId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Something worth recording happened
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    Birth {
        id: AgentId,
        name: String,
        parents: Option<(AgentId, AgentId)>,
        time: f64,
    },
    Death {
        id: AgentId,
        name: String,
        age: f32,
        cause: DeathCause,
        time: f64,
        fruit_collected: u32,
        animals_hunted: u32,
        offspring: u32,
    },
    Reproduction {
        parents: (AgentId, AgentId),
        child: AgentId,
        shelter: ShelterId,
        time: f64,
    },
    Milestone {
        id: AgentId,
        name: String,
        milestone: Milestone,
        time: f64,
    },
    GenerationAdvanced {
        generation: u32,
        population: usize,
        best_fitness: f32,
        mean_fitness: f32,
        time: f64,
    },
}

impl SimEvent {
    pub fn time(&self) -> f64 {
        match self {
            SimEvent::Birth { time, .. }
            | SimEvent::Death { time, .. }
            | SimEvent::Reproduction { time, .. }
            | SimEvent::Milestone { time, .. }
            | SimEvent::GenerationAdvanced { time, .. } => *time,
        }
    }
}

/// Receives events, fire-and-forget
pub trait EventSink: Send {
    fn record(&mut self, event: &SimEvent);
}

/// Forwards events to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Birth { id, name, parents, time } => match parents {
                Some((a, b)) => log::debug!("[{time:.1}s] {name} ({id}) born to {a} and {b}"),
                None => log::debug!("[{time:.1}s] {name} ({id}) spawned"),
            },
            SimEvent::Death { id, name, age, cause, time, .. } => {
                log::debug!("[{time:.1}s] {name} ({id}) died of {cause:?} at age {age:.0}")
            }
            SimEvent::Reproduction { parents, child, shelter, time } => log::trace!(
                "[{time:.1}s] {} and {} had {child} in shelter {}",
                parents.0,
                parents.1,
                shelter.0
            ),
            SimEvent::Milestone { id, name, milestone, time } => {
                log::trace!("[{time:.1}s] {name} ({id}) reached {milestone:?}")
            }
            SimEvent::GenerationAdvanced {
                generation,
                population,
                best_fitness,
                mean_fitness,
                ..
            } => log::info!(
                "Generation {generation}: {population} agents, best fitness {best_fitness:.1}, mean {mean_fitness:.1}"
            ),
        }
    }
}

/// Keeps the most recent events in memory
#[derive(Clone, Debug)]
pub struct EventBuffer {
    capacity: usize,
    events: VecDeque<SimEvent>,
    total: u64,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
            total: 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events recorded since creation, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for EventBuffer {
    fn record(&mut self, event: &SimEvent) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birth(id: u64) -> SimEvent {
        SimEvent::Birth {
            id: AgentId(id),
            name: format!("Agent {id}"),
            parents: None,
            time: id as f64,
        }
    }

    #[test]
    fn test_buffer_keeps_most_recent() {
        let mut buffer = EventBuffer::new(3);
        for id in 0..5 {
            buffer.record(&birth(id));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.total_recorded(), 5);
        let times: Vec<f64> = buffer.iter().map(SimEvent::time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_capacity_buffer_only_counts() {
        let mut buffer = EventBuffer::new(0);
        buffer.record(&birth(1));
        assert!(buffer.is_empty());
        assert_eq!(buffer.total_recorded(), 1);
    }

    #[test]
    fn test_events_serialize_with_kind_tag() {
        let json = serde_json::to_string(&birth(7)).unwrap();
        assert!(json.contains("\"kind\":\"birth\""));
    }
}
