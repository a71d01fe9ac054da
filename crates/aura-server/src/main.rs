//! aura - audio analysis and mood service for the aura visualizer

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use aura_core::config::{default_config_path, load_config, Config};
use aura_core::{Analyzer, MoodEngine};
use aura_server::{Dispatcher, ServeOutcome, ZmqTransport};

#[derive(Parser, Debug)]
#[command(name = "aura", version, about = "Audio analysis and mood service")]
struct Cli {
    /// Configuration file (default: <config dir>/aura/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mood model checkpoint to load
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a file and write the result as JSON
    Analyze {
        file: PathBuf,
        /// Output path (default: <file stem>_analysis.json)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Predict the mood of a file
    Classify {
        file: PathBuf,
        /// Also print the extracted feature vector
        #[arg(long)]
        features: bool,
    },
    /// Run the analysis server
    Server {
        #[arg(long, short)]
        port: Option<u16>,
        /// Interface to bind ("*" for all)
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path);
    if let Some(model) = cli.model {
        config.model.checkpoint_path = Some(model);
    }

    match cli.command {
        Command::Analyze { file, output } => analyze(&config, &file, output),
        Command::Classify { file, features } => classify(&config, &file, features),
        Command::Server { port, bind } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            config.validate();
            serve(&config)
        }
    }
}

fn analyzer(config: &Config) -> Analyzer {
    let engine = Arc::new(MoodEngine::from_config(config));
    Analyzer::new(config.analysis.clone(), engine)
}

fn analyze(config: &Config, file: &Path, output: Option<PathBuf>) -> Result<()> {
    let result = analyzer(config).analyze_file(file)?;

    println!("Duration: {:.2} seconds", result.duration);
    println!("Sample rate: {} Hz", result.sample_rate);
    println!("Tempo: {:.2} BPM", result.beats.tempo);
    println!("Beats detected: {}", result.beats.beat_count);
    println!(
        "Mood: {} ({:.2})",
        result.mood.label(),
        result.mood.confidence
    );

    let output = output.unwrap_or_else(|| default_output_path(file));
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize analysis")?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Analysis written to {}", output.display());
    Ok(())
}

fn default_output_path(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    PathBuf::from(format!("{}_analysis.json", stem))
}

fn classify(config: &Config, file: &Path, show_features: bool) -> Result<()> {
    let waveform = aura_core::audio_file::load_audio(file, config.analysis.sample_rate)
        .map_err(aura_core::AnalysisError::from)?;
    let engine = MoodEngine::from_config(config);

    if show_features {
        let features = engine
            .extractor()
            .feature_vector(&waveform.samples, waveform.sample_rate);
        for (name, value) in aura_core::FeatureVector::NAMES
            .iter()
            .zip(features.to_array())
        {
            println!("  {:<20} {:.4}", name, value);
        }
    }

    let prediction = engine.predict(&waveform.samples, waveform.sample_rate);
    println!("Predicted mood: {}", prediction.label());
    println!("Confidence: {:.2}", prediction.confidence);
    println!("Probabilities:");
    for (mood, p) in prediction.probabilities.iter() {
        println!("  {}: {:.2}", mood, p);
    }
    Ok(())
}

fn serve(config: &Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("Interrupt received, shutting down");
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let transport = ZmqTransport::bind(
        &config.server.endpoint(),
        Duration::from_millis(config.server.poll_interval_ms),
    )?;
    let mut dispatcher = Dispatcher::new(transport, analyzer(config));
    println!("Analysis server listening on {}", config.server.endpoint());

    match dispatcher.serve(&shutdown)? {
        ServeOutcome::Stopped => log::info!("Server stopped by client"),
        ServeOutcome::Interrupted => log::info!("Server interrupted"),
    }
    Ok(())
}
