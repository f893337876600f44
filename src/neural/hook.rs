//! Pluggable decision sources.
//!
//! Agents consult a [`DecisionHook`] at every decision interval. The default
//! hook is the agent's own evolved [`DecisionModel`]; a host can inject a
//! different one (for example [`RuleBasedReasoner`]) for the whole world.
//! Hooks only see a feature vector and never touch world state.

use super::features::{decode_action, Action, Features};
use super::network::DecisionModel;

/// One decision: what to do, optionally where to go, and how sure the
/// source was.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Raw movement pair in [-1, 1]; `None` lets the agent pick a random
    /// wander target.
    pub movement: Option<[f32; 2]>,
    pub confidence: f32,
}

impl Decision {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            movement: None,
            confidence: 1.0,
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            action: Action::Wander,
            movement: None,
            confidence: 0.0,
        }
    }
}

/// Maps features to a decision. Must be pure with respect to world state.
pub trait DecisionHook: Send + Sync {
    fn decide(&self, features: &Features) -> Decision;

    fn name(&self) -> &str {
        "custom"
    }
}

impl DecisionHook for DecisionModel {
    fn decide(&self, features: &Features) -> Decision {
        match self.forward(features.as_slice()) {
            Ok(output) => {
                let (action, confidence) = decode_action(&output);
                Decision {
                    action,
                    movement: Some(output.movement),
                    confidence,
                }
            }
            Err(err) => {
                log::warn!("decision model rejected features: {err}");
                Decision::default()
            }
        }
    }

    fn name(&self) -> &str {
        "model"
    }
}

/// Deterministic priority rules over the feature vector
#[derive(Clone, Debug)]
pub struct RuleBasedReasoner {
    pub critical_health: f32,
    pub hungry: f32,
    pub tired: f32,
}

impl Default for RuleBasedReasoner {
    fn default() -> Self {
        Self {
            critical_health: 0.2,
            hungry: 0.3,
            tired: 0.2,
        }
    }
}

impl RuleBasedReasoner {
    fn shelter(features: &Features) -> Action {
        if features.in_shelter() {
            Action::StayInShelter
        } else {
            Action::SeekShelter
        }
    }
}

impl DecisionHook for RuleBasedReasoner {
    fn decide(&self, features: &Features) -> Decision {
        let action = if features.health() < self.critical_health {
            if features.is_night() {
                Self::shelter(features)
            } else {
                Action::Rest
            }
        } else if features.hunger() < self.hungry {
            Action::SeekFood
        } else if features.is_night() && !features.in_shelter() {
            Action::SeekShelter
        } else if features.stamina() < self.tired {
            Action::Rest
        } else {
            Action::Wander
        };
        Decision::new(action)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
