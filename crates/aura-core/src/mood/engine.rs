//! Mood inference engine and checkpoint persistence

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::network::{DenseLayer, MoodNetwork};
use super::scaler::StandardScaler;
use super::{Mood, MoodPrediction, MoodProbabilities, MOOD_COUNT};
use crate::config::Config;
use crate::dsp::SpectralAnalysis;
use crate::error::{InferenceError, ModelError};
use crate::features::{FeatureExtractor, FeatureVector, FEATURE_COUNT};

/// Checkpoint format written by [`MoodEngine::save_checkpoint`]
pub const CHECKPOINT_VERSION: u32 = 1;

/// Where the current weights came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    /// Random weights, placeholder scaler
    Uninitialized,
    /// Weights and scaler read from a checkpoint
    Loaded { path: PathBuf },
}

/// Network and scaler, swapped as one unit
#[derive(Debug, Clone)]
pub struct MoodModel {
    pub network: MoodNetwork,
    pub scaler: StandardScaler,
    pub state: ModelState,
}

impl MoodModel {
    /// Random network with a scaler fit on placeholder data
    pub fn untrained(rng: &mut StdRng) -> Self {
        let network = MoodNetwork::random(rng);
        let scaler = StandardScaler::placeholder(rng);
        Self {
            network,
            scaler,
            state: ModelState::Uninitialized,
        }
    }

    fn infer(&self, features: &FeatureVector) -> Result<MoodPrediction, InferenceError> {
        let batch = Array2::from_shape_vec((1, FEATURE_COUNT), features.to_array().to_vec())
            .map_err(|e| InferenceError::Numeric(e.to_string()))?;
        let scaled = self.scaler.transform(&batch)?;
        let output = self.network.forward(&scaled)?;

        let row = output.row(0).to_vec();
        let values: [f32; MOOD_COUNT] =
            row.as_slice().try_into().map_err(|_| InferenceError::Shape {
                expected: MOOD_COUNT,
                found: row.len(),
            })?;
        if values.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::Numeric(
                "Network produced non-finite probabilities".to_string(),
            ));
        }
        Ok(MoodPrediction::from_probabilities(MoodProbabilities::new(values)))
    }

    fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            format_version: CHECKPOINT_VERSION,
            moods: Mood::ALL.iter().map(|m| m.label().to_string()).collect(),
            layers: self
                .network
                .layers()
                .iter()
                .map(|layer| LayerCheckpoint::from_layer(layer))
                .collect(),
            scaler: self.scaler.clone(),
        }
    }
}

/// One dense layer in a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCheckpoint {
    /// Row-major `[out][in]`
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl LayerCheckpoint {
    fn from_layer(layer: &DenseLayer) -> Self {
        Self {
            weights: layer.weights.outer_iter().map(|row| row.to_vec()).collect(),
            bias: layer.bias.to_vec(),
        }
    }

    fn into_layer(self, index: usize) -> Result<DenseLayer, ModelError> {
        let rows = self.weights.len();
        let cols = self.weights.first().map_or(0, Vec::len);
        if self.weights.iter().any(|r| r.len() != cols) {
            return Err(ModelError::Mismatch(format!(
                "layer {} has ragged weight rows",
                index
            )));
        }
        let flat: Vec<f32> = self.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| ModelError::Mismatch(format!("layer {}: {}", index, e)))?;
        Ok(DenseLayer {
            weights,
            bias: Array1::from(self.bias),
        })
    }
}

/// Persisted model: weights, scaler statistics and the vocabulary order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub moods: Vec<String>,
    pub layers: Vec<LayerCheckpoint>,
    pub scaler: StandardScaler,
}

impl Checkpoint {
    /// Validate and convert into a loaded model
    pub fn into_model(self, path: &Path) -> Result<MoodModel, ModelError> {
        if self.format_version != CHECKPOINT_VERSION {
            return Err(ModelError::Mismatch(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        let expected: Vec<&str> = Mood::ALL.iter().map(|m| m.label()).collect();
        if self.moods != expected {
            return Err(ModelError::Mismatch(format!(
                "mood order {:?} does not match {:?}",
                self.moods, expected
            )));
        }
        if self.scaler.mean.len() != FEATURE_COUNT || self.scaler.var.len() != FEATURE_COUNT {
            return Err(ModelError::Mismatch(format!(
                "scaler has {}/{} statistics, expected {}",
                self.scaler.mean.len(),
                self.scaler.var.len(),
                FEATURE_COUNT
            )));
        }
        if self.scaler.var.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ModelError::Mismatch(
                "scaler variance must be finite and non-negative".to_string(),
            ));
        }

        let [fc1, fc2, fc3]: [LayerCheckpoint; 3] =
            self.layers.try_into().map_err(|layers: Vec<_>| {
                ModelError::Mismatch(format!("expected 3 layers, found {}", layers.len()))
            })?;
        let network = MoodNetwork::from_layers(
            fc1.into_layer(0)?,
            fc2.into_layer(1)?,
            fc3.into_layer(2)?,
        )
        .map_err(|e| ModelError::Mismatch(e.to_string()))?;

        Ok(MoodModel {
            network,
            scaler: self.scaler,
            state: ModelState::Loaded {
                path: path.to_path_buf(),
            },
        })
    }
}

/// Mood inference engine
///
/// The model sits behind `RwLock<Arc<_>>`: inference clones the `Arc` and
/// releases the lock before computing, so loading a checkpoint swaps the
/// whole model at once and running predictions keep the one they started
/// with.
pub struct MoodEngine {
    extractor: FeatureExtractor,
    model: RwLock<Arc<MoodModel>>,
}

impl MoodEngine {
    /// Untrained engine; `seed` makes the random weights reproducible
    pub fn new(extractor: FeatureExtractor, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            extractor,
            model: RwLock::new(Arc::new(MoodModel::untrained(&mut rng))),
        }
    }

    /// Untrained engine with the default extractor
    pub fn with_seed(seed: u64) -> Self {
        Self::new(FeatureExtractor::default(), Some(seed))
    }

    /// Build from configuration, loading the configured checkpoint if any
    ///
    /// A checkpoint that fails to load is logged and the engine stays
    /// uninitialized.
    pub fn from_config(config: &Config) -> Self {
        let engine = Self::new(
            FeatureExtractor::from_config(&config.analysis),
            config.model.seed,
        );
        if let Some(path) = &config.model.checkpoint_path {
            if let Err(e) = engine.load_checkpoint(path) {
                log::warn!(
                    "Failed to load mood model from {:?}: {}, using untrained model",
                    path,
                    e
                );
            }
        }
        engine
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Current model snapshot
    pub fn model(&self) -> Result<Arc<MoodModel>, InferenceError> {
        self.model
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| InferenceError::Poisoned)
    }

    /// Where the current model came from
    pub fn state(&self) -> Result<ModelState, InferenceError> {
        self.model().map(|m| m.state.clone())
    }

    /// Predict the mood of a waveform, falling back to "unknown" on failure
    pub fn predict(&self, samples: &[f32], sample_rate: u32) -> MoodPrediction {
        self.try_predict(samples, sample_rate).unwrap_or_else(|e| {
            log::warn!("Mood inference failed, returning fallback: {}", e);
            MoodPrediction::fallback()
        })
    }

    pub fn try_predict(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<MoodPrediction, InferenceError> {
        let features = self.extractor.try_feature_vector(samples, sample_rate)?;
        self.try_predict_features(&features)
    }

    /// Predict from an already computed spectral analysis of `samples`
    pub fn predict_analysis(&self, analysis: &SpectralAnalysis, samples: &[f32]) -> MoodPrediction {
        self.try_predict_analysis(analysis, samples)
            .unwrap_or_else(|e| {
                log::warn!("Mood inference failed, returning fallback: {}", e);
                MoodPrediction::fallback()
            })
    }

    pub fn try_predict_analysis(
        &self,
        analysis: &SpectralAnalysis,
        samples: &[f32],
    ) -> Result<MoodPrediction, InferenceError> {
        let features = self.extractor.try_feature_vector_from(analysis, samples)?;
        self.try_predict_features(&features)
    }

    /// Predict from an already extracted feature vector
    pub fn predict_features(&self, features: &FeatureVector) -> MoodPrediction {
        self.try_predict_features(features).unwrap_or_else(|e| {
            log::warn!("Mood inference failed, returning fallback: {}", e);
            MoodPrediction::fallback()
        })
    }

    pub fn try_predict_features(
        &self,
        features: &FeatureVector,
    ) -> Result<MoodPrediction, InferenceError> {
        self.model()?.infer(features)
    }

    /// Swap in a new model
    pub fn replace_model(&self, model: MoodModel) -> Result<(), ModelError> {
        let mut guard = self.model.write().map_err(|_| ModelError::Poisoned)?;
        *guard = Arc::new(model);
        Ok(())
    }

    /// Load weights and scaler from a JSON checkpoint
    ///
    /// The current model is kept if reading or validation fails.
    pub fn load_checkpoint(&self, path: &Path) -> Result<(), ModelError> {
        log::info!("Loading mood model from {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let checkpoint: Checkpoint = serde_json::from_str(&contents)?;
        let model = checkpoint.into_model(path)?;
        self.replace_model(model)?;
        log::info!("Mood model loaded from {:?}", path);
        Ok(())
    }

    /// Write the current weights and scaler as a JSON checkpoint
    pub fn save_checkpoint(&self, path: &Path) -> Result<(), ModelError> {
        let model = self.model.read().map_err(|_| ModelError::Poisoned)?.clone();
        let json = serde_json::to_string_pretty(&model.to_checkpoint())?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ModelError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Mood model saved to {:?}", path);
        Ok(())
    }
}
