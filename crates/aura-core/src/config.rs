//! Global configuration for aura
//!
//! Configuration is stored as YAML.
//! Default location: <config dir>/aura/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{
    CHUNK_WAVEFORM_POINTS, DEFAULT_SAMPLE_RATE, FRAME_SIZE, HOP_SIZE, WAVEFORM_POINTS,
};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Request/reply endpoint settings
    pub server: ServerConfig,
    /// Analysis settings (frame geometry, BPM range, waveform sizes)
    pub analysis: AnalysisConfig,
    /// Mood model settings
    pub model: ModelConfig,
}

impl Config {
    /// Clamp every section to supported ranges
    pub fn validate(&mut self) {
        self.server.validate();
        self.analysis.validate();
    }
}

/// Server configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind ("*" = all interfaces)
    pub bind_address: String,
    /// TCP port of the reply socket
    pub port: u16,
    /// How long a receive blocks before the shutdown flag is checked again
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("*"),
            port: 5555,
            poll_interval_ms: 250,
        }
    }
}

impl ServerConfig {
    pub fn validate(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.clamp(10, 5000);
        if self.bind_address.trim().is_empty() {
            self.bind_address = String::from("*");
        }
    }

    /// ZeroMQ endpoint string, e.g. `tcp://*:5555`
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.bind_address, self.port)
    }
}

/// Analysis configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample rate files are decoded/resampled to
    pub sample_rate: u32,
    /// STFT frame length (power of two)
    pub frame_size: usize,
    /// Hop between analysis frames
    pub hop_size: usize,
    /// Waveform overview size for whole files
    pub waveform_points: usize,
    /// Waveform overview size for live chunks
    pub chunk_waveform_points: usize,
    /// Tempo tracking settings
    pub bpm: BpmConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: FRAME_SIZE,
            hop_size: HOP_SIZE,
            waveform_points: WAVEFORM_POINTS,
            chunk_waveform_points: CHUNK_WAVEFORM_POINTS,
            bpm: BpmConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&mut self) {
        self.sample_rate = self.sample_rate.clamp(1000, 384_000);
        self.frame_size = self.frame_size.clamp(256, 16384).next_power_of_two().min(16384);
        self.hop_size = self.hop_size.clamp(1, self.frame_size);
        self.waveform_points = self.waveform_points.max(1);
        self.chunk_waveform_points = self.chunk_waveform_points.max(1);
        self.bpm.validate();
    }
}

/// Tempo tracking configuration
///
/// `start_bpm` is the centre of the tempo prior, `tightness` how strongly
/// the beat tracker sticks to the estimated period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmConfig {
    /// Minimum candidate tempo in BPM
    pub min_tempo: f32,
    /// Maximum candidate tempo in BPM
    pub max_tempo: f32,
    /// Prior tempo in BPM
    pub start_bpm: f32,
    /// Beat tracker period adherence
    pub tightness: f32,
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            min_tempo: 30.0,
            max_tempo: 300.0,
            start_bpm: 120.0,
            tightness: 100.0,
        }
    }
}

impl BpmConfig {
    /// Clamp values to the supported range
    pub fn validate(&mut self) {
        self.min_tempo = self.min_tempo.clamp(30.0, 280.0);
        self.max_tempo = self.max_tempo.clamp(50.0, 300.0);

        // Ensure min < max with at least 20 BPM gap
        if self.min_tempo + 20.0 > self.max_tempo {
            self.max_tempo = (self.min_tempo + 20.0).min(300.0);
        }
        self.start_bpm = self.start_bpm.clamp(self.min_tempo, self.max_tempo);
        self.tightness = self.tightness.max(0.0);
    }
}

/// Mood model configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Checkpoint to load at startup (untrained network when absent)
    pub checkpoint_path: Option<PathBuf>,
    /// Seed for the untrained network and placeholder scaler
    pub seed: Option<u64>,
}

/// Get the default config file path
///
/// Returns: <config dir>/aura/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aura")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> Config {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
            Ok(mut config) => {
                config.validate();
                log::info!(
                    "load_config: Loaded config - port {}, {} Hz, BPM range: {}-{}",
                    config.server.port,
                    config.analysis.sample_rate,
                    config.analysis.bpm.min_tempo,
                    config.analysis.bpm.max_tempo
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                Config::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            Config::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}
