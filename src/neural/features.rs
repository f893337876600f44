//! Feature extraction and output decoding for decision models.
//!
//! Feature layout (18 values, all in [0, 1]):
//!   0-3:   health, hunger, stamina and age ratios
//!   4-6:   life stage one-hot (child, adult, elder)
//!   7:     night flag
//!   8:     nearest food distance / vision range (1.0 when none in sight)
//!   9:     nearest free shelter distance / search radius
//!   10:    can reproduce
//!   11:    currently sheltered
//!   12-17: last action one-hot

use super::network::ModelOutput;
use crate::entities::LifeStage;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

pub const FEATURE_COUNT: usize = 18;

const STAGE_OFFSET: usize = 4;
const LAST_ACTION_OFFSET: usize = 12;

/// High-level behaviour a decision can request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[default]
    Wander,
    SeekFood,
    Eat,
    Rest,
    SeekShelter,
    StayInShelter,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Wander,
        Action::SeekFood,
        Action::Eat,
        Action::Rest,
        Action::SeekShelter,
        Action::StayInShelter,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }
}

/// Agent and world facts a feature vector is built from
#[derive(Clone, Debug)]
pub struct FeatureInputs {
    pub health_ratio: f32,
    pub hunger_ratio: f32,
    pub stamina_ratio: f32,
    pub age_ratio: f32,
    pub stage: LifeStage,
    pub is_night: bool,
    pub nearest_food: Option<f32>,
    pub nearest_shelter: Option<f32>,
    pub vision_range: f32,
    pub shelter_search_radius: f32,
    pub can_reproduce: bool,
    pub in_shelter: bool,
    pub last_action: Action,
}

/// Fixed-size model input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Features([f32; FEATURE_COUNT]);

fn ratio(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn distance_ratio(distance: Option<f32>, scale: f32) -> f32 {
    match distance {
        Some(d) if scale > 0.0 => ratio(d / scale),
        _ => 1.0,
    }
}

impl Features {
    pub fn extract(inputs: &FeatureInputs) -> Self {
        let mut values = [0.0f32; FEATURE_COUNT];
        values[0] = ratio(inputs.health_ratio);
        values[1] = ratio(inputs.hunger_ratio);
        values[2] = ratio(inputs.stamina_ratio);
        values[3] = ratio(inputs.age_ratio);

        let stage = match inputs.stage {
            LifeStage::Child => 0,
            LifeStage::Adult => 1,
            LifeStage::Elder => 2,
        };
        values[STAGE_OFFSET + stage] = 1.0;

        values[7] = if inputs.is_night { 1.0 } else { 0.0 };
        values[8] = distance_ratio(inputs.nearest_food, inputs.vision_range);
        values[9] = distance_ratio(inputs.nearest_shelter, inputs.shelter_search_radius);
        values[10] = if inputs.can_reproduce { 1.0 } else { 0.0 };
        values[11] = if inputs.in_shelter { 1.0 } else { 0.0 };
        values[LAST_ACTION_OFFSET + inputs.last_action.index()] = 1.0;

        Self(values)
    }

    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn health(&self) -> f32 {
        self.0[0]
    }

    pub fn hunger(&self) -> f32 {
        self.0[1]
    }

    pub fn stamina(&self) -> f32 {
        self.0[2]
    }

    pub fn stage(&self) -> LifeStage {
        if self.0[STAGE_OFFSET + 2] > 0.5 {
            LifeStage::Elder
        } else if self.0[STAGE_OFFSET + 1] > 0.5 {
            LifeStage::Adult
        } else {
            LifeStage::Child
        }
    }

    pub fn is_night(&self) -> bool {
        self.0[7] > 0.5
    }

    pub fn food_distance(&self) -> f32 {
        self.0[8]
    }

    pub fn shelter_distance(&self) -> f32 {
        self.0[9]
    }

    pub fn in_shelter(&self) -> bool {
        self.0[11] > 0.5
    }
}

/// Highest-probability action; ties go to the earliest action
pub fn decode_action(output: &ModelOutput) -> (Action, f32) {
    let mut best = 0;
    for (i, &p) in output.actions.iter().enumerate() {
        if p > output.actions[best] {
            best = i;
        }
    }
    (Action::ALL[best], output.actions[best])
}

/// Map the movement pair to a polar offset: angle = (m0 + 1) * PI,
/// distance = (m1 + 1) / 2 * max_distance.
pub fn decode_movement(movement: [f32; 2], max_distance: f32) -> (f32, f32) {
    let angle = (movement[0].clamp(-1.0, 1.0) + 1.0) * PI;
    let distance = (movement[1].clamp(-1.0, 1.0) + 1.0) * 0.5 * max_distance;
    (angle.cos() * distance, angle.sin() * distance)
}
