//! Fixed-topology feed-forward decision network.

use super::features::{Action, FEATURE_COUNT};
use crate::error::ModelError;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute bound on any weight or bias
pub const WEIGHT_LIMIT: f32 = 5.0;
/// Number of movement outputs (angle, distance)
pub const MOVEMENT_OUTPUTS: usize = 2;

/// Layer widths of a decision network. Two networks can only be recombined
/// when their topologies are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    pub inputs: usize,
    pub hidden: Vec<usize>,
    pub actions: usize,
    pub movement: usize,
}

impl Topology {
    pub fn new(inputs: usize, hidden: Vec<usize>) -> Self {
        Self {
            inputs,
            hidden,
            actions: Action::ALL.len(),
            movement: MOVEMENT_OUTPUTS,
        }
    }

    /// Feature-sized input with the given hidden widths
    pub fn with_hidden(hidden: &[usize]) -> Self {
        Self::new(FEATURE_COUNT, hidden.to_vec())
    }

    /// Width feeding both output heads
    fn last_hidden(&self) -> usize {
        self.hidden.last().copied().unwrap_or(self.inputs)
    }

    /// (inputs, outputs) of every layer in flattening order: hidden layers,
    /// then the action head, then the movement head.
    fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let mut shapes = Vec::with_capacity(self.hidden.len() + 2);
        let mut prev = self.inputs;
        for &width in &self.hidden {
            shapes.push((prev, width));
            prev = width;
        }
        shapes.push((prev, self.actions));
        shapes.push((self.last_hidden(), self.movement));
        shapes
    }

    /// Total number of weights and biases
    pub fn weight_count(&self) -> usize {
        self.layer_shapes()
            .iter()
            .map(|&(rows, cols)| rows * cols + cols)
            .sum()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inputs)?;
        for width in &self.hidden {
            write!(f, "-{width}")?;
        }
        write!(f, "-{}+{}", self.actions, self.movement)
    }
}

/// A single dense layer
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl Layer {
    fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            weights: Array2::zeros((inputs, outputs)),
            biases: Array1::zeros(outputs),
        }
    }

    #[inline]
    fn apply(&self, input: &Array1<f32>) -> Array1<f32> {
        input.dot(&self.weights) + &self.biases
    }

    /// Weights (row-major) followed by biases
    pub(crate) fn values(&self) -> impl Iterator<Item = &f32> {
        self.weights.iter().chain(self.biases.iter())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.weights.iter_mut().chain(self.biases.iter_mut())
    }
}

impl Serialize for Layer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let shape = self.weights.shape();
        let weights: Vec<f32> = self.weights.iter().copied().collect();
        let biases: Vec<f32> = self.biases.iter().copied().collect();

        let mut state = serializer.serialize_struct("Layer", 3)?;
        state.serialize_field("shape", &[shape[0], shape[1]])?;
        state.serialize_field("weights", &weights)?;
        state.serialize_field("biases", &biases)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct LayerData {
            shape: [usize; 2],
            weights: Vec<f32>,
            biases: Vec<f32>,
        }

        let data = LayerData::deserialize(deserializer)?;
        let weights = Array2::from_shape_vec((data.shape[0], data.shape[1]), data.weights)
            .map_err(serde::de::Error::custom)?;
        Ok(Layer {
            weights,
            biases: Array1::from_vec(data.biases),
        })
    }
}

/// Raw network output before decoding
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelOutput {
    /// Softmax distribution over [`Action::ALL`]
    pub actions: [f32; 6],
    /// tanh-squashed movement pair in [-1, 1]
    pub movement: [f32; MOVEMENT_OUTPUTS],
}

/// Feed-forward network: ReLU hidden layers, a softmax action head and a
/// tanh movement head sharing the last hidden layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionModel {
    topology: Topology,
    hidden: Vec<Layer>,
    action_head: Layer,
    movement_head: Layer,
}

impl DecisionModel {
    /// All-zero weights and biases
    pub fn zeroed(topology: Topology) -> Self {
        let mut prev = topology.inputs;
        let mut hidden = Vec::with_capacity(topology.hidden.len());
        for &width in &topology.hidden {
            hidden.push(Layer::zeros(prev, width));
            prev = width;
        }
        let action_head = Layer::zeros(prev, topology.actions);
        let movement_head = Layer::zeros(prev, topology.movement);

        Self {
            topology,
            hidden,
            action_head,
            movement_head,
        }
    }

    /// Random weights in (-weight_range, weight_range), zero biases
    pub fn random<R: Rng>(topology: Topology, weight_range: f32, rng: &mut R) -> Self {
        let mut model = Self::zeroed(topology);
        let range = weight_range.min(WEIGHT_LIMIT);
        if range > 0.0 {
            for layer in model.layers_mut() {
                layer.weights.mapv_inplace(|_| rng.gen_range(-range..range));
            }
        }
        model
    }

    /// Rebuild a model from a flat weight vector produced by [`weights`].
    ///
    /// [`weights`]: DecisionModel::weights
    pub fn from_weights(topology: Topology, weights: &[f32]) -> Result<Self, ModelError> {
        let expected = topology.weight_count();
        if weights.len() != expected {
            return Err(ModelError::WeightCount {
                expected,
                actual: weights.len(),
            });
        }

        let mut model = Self::zeroed(topology);
        for (slot, &value) in model.values_mut().zip(weights) {
            *slot = value;
        }
        Ok(model)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn weight_count(&self) -> usize {
        self.topology.weight_count()
    }

    /// All weights and biases in a fixed order
    pub fn weights(&self) -> Vec<f32> {
        self.values().copied().collect()
    }

    pub(crate) fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.hidden
            .iter()
            .chain(std::iter::once(&self.action_head))
            .chain(std::iter::once(&self.movement_head))
    }

    pub(crate) fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.hidden
            .iter_mut()
            .chain(std::iter::once(&mut self.action_head))
            .chain(std::iter::once(&mut self.movement_head))
    }

    fn values(&self) -> impl Iterator<Item = &f32> {
        self.layers().flat_map(Layer::values)
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.layers_mut().flat_map(Layer::values_mut)
    }

    /// Forward pass. Pure: the same input always yields the same output.
    pub fn forward(&self, inputs: &[f32]) -> Result<ModelOutput, ModelError> {
        if inputs.len() != self.topology.inputs {
            return Err(ModelError::FeatureCount {
                expected: self.topology.inputs,
                actual: inputs.len(),
            });
        }

        let mut activation = Array1::from_vec(inputs.to_vec());
        for layer in &self.hidden {
            activation = layer.apply(&activation);
            activation.mapv_inplace(|x| x.max(0.0));
        }

        let logits = self.action_head.apply(&activation);
        let mut actions = [0.0f32; 6];
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut total = 0.0;
        for (slot, &logit) in actions.iter_mut().zip(logits.iter()) {
            *slot = (logit - max).exp();
            total += *slot;
        }
        if total > 0.0 && total.is_finite() {
            actions.iter_mut().for_each(|p| *p /= total);
        } else {
            actions = [1.0 / 6.0; 6];
        }

        let raw_movement = self.movement_head.apply(&activation);
        let mut movement = [0.0f32; MOVEMENT_OUTPUTS];
        for (slot, &value) in movement.iter_mut().zip(raw_movement.iter()) {
            *slot = value.tanh();
        }

        Ok(ModelOutput { actions, movement })
    }

    /// Check if the network is valid (no NaN/Inf)
    pub fn is_valid(&self) -> bool {
        self.values().all(|w| w.is_finite())
    }
}
