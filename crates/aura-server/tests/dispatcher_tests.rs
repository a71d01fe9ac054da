//! End-to-end tests: a dispatcher serving over an in-process channel

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aura_core::config::AnalysisConfig;
use aura_core::{Analyzer, MoodEngine};
use aura_server::{ChannelClient, ChannelTransport, Dispatcher, ServeOutcome, TransportError};
use serde_json::{json, Value};

struct Server {
    client: ChannelClient,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<Result<ServeOutcome, TransportError>>,
}

fn start_server() -> Server {
    let (transport, client) = ChannelTransport::pair(Duration::from_millis(20));
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let handle = thread::spawn(move || {
        let analyzer = Analyzer::new(
            AnalysisConfig::default(),
            Arc::new(MoodEngine::with_seed(7)),
        );
        let mut dispatcher = Dispatcher::new(transport, analyzer);
        dispatcher.serve(&flag)
    });

    Server {
        client,
        shutdown,
        handle,
    }
}

fn request(client: &ChannelClient, body: Value) -> Value {
    let reply = client.request(body.to_string().as_bytes()).unwrap();
    serde_json::from_slice(&reply).unwrap()
}

fn write_wav(path: &Path, samples: &[f32], sr: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn unknown_command_between_chunks_keeps_serving() {
    let server = start_server();
    let chunk = json!({"command": "analyze_chunk", "audio_data": vec![0.1f32; 2048]});

    let first = request(&server.client, chunk.clone());
    let middle = request(&server.client, json!({"command": "explode"}));
    let last = request(&server.client, chunk);

    assert_eq!(first["status"], "success");
    assert_eq!(
        middle,
        json!({"status": "error", "message": "Unknown command: explode"})
    );
    assert_eq!(last["status"], "success");
    assert_eq!(first, last);

    let stop = request(&server.client, json!({"command": "stop"}));
    assert_eq!(stop, json!({"status": "stopping"}));
    assert_eq!(server.handle.join().unwrap().unwrap(), ServeOutcome::Stopped);
}

#[test]
fn silent_chunk_has_zero_rms() {
    let server = start_server();
    let reply = request(
        &server.client,
        json!({"command": "analyze_chunk", "audio_data": vec![0.0f32; 5 * 44100], "sample_rate": 44100}),
    );

    assert_eq!(reply["status"], "success");
    let data = &reply["data"];
    assert_eq!(data["rms"], json!(0.0));
    assert!(data["spectral_centroid"].is_number());
    assert_eq!(data["waveform"].as_array().unwrap().len(), 100);

    request(&server.client, json!({"command": "stop"}));
    server.handle.join().unwrap().unwrap();
}

#[test]
fn missing_file_is_error_reply() {
    let server = start_server();
    let reply = request(
        &server.client,
        json!({"command": "analyze_file", "file_path": "/definitely/not/here.wav"}),
    );
    assert_eq!(
        reply,
        json!({"status": "error", "message": "Failed to load audio file"})
    );

    // Still serving
    let reply = request(&server.client, json!({"command": "analyze_chunk", "audio_data": [0.5]}));
    assert_eq!(reply["status"], "success");

    request(&server.client, json!({"command": "stop"}));
    server.handle.join().unwrap().unwrap();
}

#[test]
fn analyze_file_reply_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let samples: Vec<f32> = (0..44100 * 2)
        .map(|i| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / 44100.0).sin() * 0.4)
        .collect();
    write_wav(&path, &samples, 44100);

    let server = start_server();
    let reply = request(
        &server.client,
        json!({"command": "analyze_file", "file_path": path.to_str().unwrap()}),
    );

    assert_eq!(reply["status"], "success", "{}", reply);
    let data = &reply["data"];
    assert!((data["duration"].as_f64().unwrap() - 2.0).abs() < 0.01);
    assert_eq!(data["sample_rate"], 44100);
    for key in ["tempo", "beat_times", "beat_count"] {
        assert!(data["beats"].get(key).is_some(), "beats.{}", key);
    }
    for key in ["spectral_centroids", "rms_energy", "onset_times", "chroma_mean"] {
        assert!(data["features"].get(key).is_some(), "features.{}", key);
    }
    assert_eq!(data["waveform"].as_array().unwrap().len(), 1000);

    let mood = &data["mood"];
    assert!(mood["predicted_mood"].is_string());
    let probs = mood["probabilities"].as_object().unwrap();
    assert_eq!(probs.len(), 5);
    let total: f64 = probs.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-3);

    request(&server.client, json!({"command": "stop"}));
    server.handle.join().unwrap().unwrap();
}

#[test]
fn invalid_requests_are_error_replies() {
    let server = start_server();

    let reply = request(&server.client, json!({"no_command": true}));
    assert_eq!(reply["message"], "Missing or invalid 'command' field");

    let reply = request(&server.client, json!({"command": "analyze_chunk", "audio_data": []}));
    assert_eq!(reply["message"], "audio_data is empty");

    let raw = server.client.request(b"\xff\xfe garbage").unwrap();
    let reply: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(reply["status"], "error");

    request(&server.client, json!({"command": "stop"}));
    assert_eq!(server.handle.join().unwrap().unwrap(), ServeOutcome::Stopped);
}

#[test]
fn shutdown_flag_interrupts_idle_loop() {
    let server = start_server();
    server.shutdown.store(true, Ordering::SeqCst);
    assert_eq!(
        server.handle.join().unwrap().unwrap(),
        ServeOutcome::Interrupted
    );
}
