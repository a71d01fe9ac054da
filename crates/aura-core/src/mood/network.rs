//! Fixed 19 → 64 → 32 → 5 feed-forward classifier

use ndarray::{Array1, Array2, Axis};
use rand::Rng;

use super::MOOD_COUNT;
use crate::error::InferenceError;
use crate::features::FEATURE_COUNT;

/// Width of the first hidden layer
pub const HIDDEN_1: usize = 64;

/// Width of the second hidden layer
pub const HIDDEN_2: usize = HIDDEN_1 / 2;

/// Fully connected layer, `y = x · Wᵀ + b`
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    /// `[out][in]`
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl DenseLayer {
    /// Uniform init in `±1/sqrt(fan_in)` for weights and bias
    pub fn random<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (fan_in as f32).sqrt();
        let weights = Array2::from_shape_fn((fan_out, fan_in), |_| rng.random_range(-bound..bound));
        let bias = Array1::from_shape_fn(fan_out, |_| rng.random_range(-bound..bound));
        Self { weights, bias }
    }

    pub fn fan_in(&self) -> usize {
        self.weights.ncols()
    }

    pub fn fan_out(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weights.t()) + &self.bias
    }
}

/// Mood classifier network
#[derive(Debug, Clone, PartialEq)]
pub struct MoodNetwork {
    pub fc1: DenseLayer,
    pub fc2: DenseLayer,
    pub fc3: DenseLayer,
}

impl MoodNetwork {
    /// Untrained network
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            fc1: DenseLayer::random(FEATURE_COUNT, HIDDEN_1, rng),
            fc2: DenseLayer::random(HIDDEN_1, HIDDEN_2, rng),
            fc3: DenseLayer::random(HIDDEN_2, MOOD_COUNT, rng),
        }
    }

    /// Assemble from layers, checking every shape
    pub fn from_layers(
        fc1: DenseLayer,
        fc2: DenseLayer,
        fc3: DenseLayer,
    ) -> Result<Self, InferenceError> {
        let expected = [
            (FEATURE_COUNT, HIDDEN_1),
            (HIDDEN_1, HIDDEN_2),
            (HIDDEN_2, MOOD_COUNT),
        ];
        for (layer, (fan_in, fan_out)) in [&fc1, &fc2, &fc3].into_iter().zip(expected) {
            if layer.fan_in() != fan_in {
                return Err(InferenceError::Shape {
                    expected: fan_in,
                    found: layer.fan_in(),
                });
            }
            if layer.fan_out() != fan_out || layer.bias.len() != fan_out {
                return Err(InferenceError::Shape {
                    expected: fan_out,
                    found: layer.fan_out().min(layer.bias.len()),
                });
            }
        }
        Ok(Self { fc1, fc2, fc3 })
    }

    pub fn layers(&self) -> [&DenseLayer; 3] {
        [&self.fc1, &self.fc2, &self.fc3]
    }

    /// Class probabilities for a batch of standardized feature rows
    pub fn forward(&self, batch: &Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        if batch.ncols() != FEATURE_COUNT {
            return Err(InferenceError::Shape {
                expected: FEATURE_COUNT,
                found: batch.ncols(),
            });
        }
        let h1 = relu(self.fc1.forward(batch));
        let h2 = relu(self.fc2.forward(&h1));
        Ok(softmax(self.fc3.forward(&h2)))
    }
}

fn relu(x: Array2<f32>) -> Array2<f32> {
    x.mapv_into(|v| v.max(0.0))
}

/// Row-wise softmax, shifted by the row max
fn softmax(mut logits: Array2<f32>) -> Array2<f32> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    logits
}
