//! Request dispatcher
//!
//! Single-threaded request/reply loop: wait for one request, run it to
//! completion, send exactly one reply, repeat. Every failure inside a
//! request (bad JSON, unknown command, decode error, even a panic) becomes
//! an error reply and the loop keeps serving.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use aura_core::{AnalysisError, AnalysisResult, Analyzer, ChunkAnalysis};

use crate::protocol::{Request, Response};
use crate::transport::{Transport, TransportError};

/// What the loop does after replying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Why [`Dispatcher::serve`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A `stop` command was answered
    Stopped,
    /// The shutdown flag was raised
    Interrupted,
}

/// The work behind the analysis commands
pub trait RequestHandler {
    fn analyze_file(&self, path: &Path) -> Result<AnalysisResult, AnalysisError>;

    fn analyze_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<ChunkAnalysis, AnalysisError>;
}

impl RequestHandler for Analyzer {
    fn analyze_file(&self, path: &Path) -> Result<AnalysisResult, AnalysisError> {
        Analyzer::analyze_file(self, path)
    }

    fn analyze_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<ChunkAnalysis, AnalysisError> {
        Analyzer::analyze_chunk(self, samples, sample_rate)
    }
}

/// Translates wire requests into handler calls
pub struct Dispatcher<T: Transport, H: RequestHandler = Analyzer> {
    transport: T,
    handler: H,
}

impl<T: Transport, H: RequestHandler> Dispatcher<T, H> {
    pub fn new(transport: T, handler: H) -> Self {
        Self { transport, handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serve requests until `stop` or until `shutdown` is set
    ///
    /// The flag is checked between requests, at least once per transport
    /// poll interval.
    pub fn serve(&mut self, shutdown: &AtomicBool) -> Result<ServeOutcome, TransportError> {
        log::info!("Dispatcher ready");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("Shutdown requested, leaving serving loop");
                return Ok(ServeOutcome::Interrupted);
            }

            let Some(payload) = self.transport.recv()? else {
                continue;
            };

            let (response, control) = self.handle(&payload);
            self.transport.send(&response.to_bytes())?;

            if control == Control::Stop {
                log::info!("Stop command received, leaving serving loop");
                return Ok(ServeOutcome::Stopped);
            }
        }
    }

    /// Produce the reply for one raw request
    pub fn handle(&self, payload: &[u8]) -> (Response, Control) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(payload))) {
            Ok(reply) => reply,
            Err(cause) => {
                let message = panic_message(cause.as_ref());
                log::error!("Request handler panicked: {}", message);
                (Response::error(message), Control::Continue)
            }
        }
    }

    fn dispatch(&self, payload: &[u8]) -> (Response, Control) {
        let request = match Request::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Rejected request: {}", e);
                return (Response::error(e.to_string()), Control::Continue);
            }
        };
        log::debug!("Handling {}", request.command());

        match request {
            Request::Stop => (Response::Stopping, Control::Stop),

            Request::AnalyzeFile { file_path } => {
                let reply = match self.handler.analyze_file(&file_path) {
                    Ok(result) => Response::success(&result),
                    Err(e) => {
                        log::warn!("analyze_file {:?} failed: {}", file_path, e);
                        Response::error(e.to_string())
                    }
                };
                (reply, Control::Continue)
            }

            Request::AnalyzeChunk {
                audio_data,
                sample_rate,
            } => {
                let reply = match self.handler.analyze_chunk(&audio_data, sample_rate) {
                    Ok(chunk) => Response::success(&chunk),
                    Err(e) => {
                        log::warn!("analyze_chunk failed: {}", e);
                        Response::error(e.to_string())
                    }
                };
                (reply, Control::Continue)
            }
        }
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "Internal error while handling request".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use aura_core::config::AnalysisConfig;
    use aura_core::MoodEngine;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    /// Panics on every file request, answers chunks with a fixed result
    struct FragileHandler;

    impl RequestHandler for FragileHandler {
        fn analyze_file(&self, path: &Path) -> Result<AnalysisResult, AnalysisError> {
            panic!("decoder blew up on {}", path.display());
        }

        fn analyze_chunk(
            &self,
            samples: &[f32],
            _sample_rate: u32,
        ) -> Result<ChunkAnalysis, AnalysisError> {
            Ok(ChunkAnalysis {
                waveform: samples.to_vec(),
                rms: 0.5,
                spectral_centroid: 1000.0,
            })
        }
    }

    fn dispatcher() -> Dispatcher<ChannelTransport> {
        let (transport, _client) = ChannelTransport::pair(Duration::from_millis(10));
        let analyzer = Analyzer::new(
            AnalysisConfig::default(),
            Arc::new(MoodEngine::with_seed(1)),
        );
        Dispatcher::new(transport, analyzer)
    }

    fn reply(response: &Response) -> Value {
        serde_json::from_slice(&response.to_bytes()).unwrap()
    }

    #[test]
    fn test_stop() {
        let (response, control) = dispatcher().handle(br#"{"command": "stop"}"#);
        assert_eq!(control, Control::Stop);
        assert_eq!(reply(&response), json!({"status": "stopping"}));
    }

    #[test]
    fn test_unknown_command() {
        let (response, control) = dispatcher().handle(br#"{"command": "dance"}"#);
        assert_eq!(control, Control::Continue);
        assert_eq!(
            reply(&response),
            json!({"status": "error", "message": "Unknown command: dance"})
        );
    }

    #[test]
    fn test_malformed_json() {
        let (response, control) = dispatcher().handle(b"not json at all");
        assert_eq!(control, Control::Continue);
        assert_eq!(reply(&response)["status"], "error");
    }

    #[test]
    fn test_chunk_reply_shape() {
        let (response, _) =
            dispatcher().handle(br#"{"command": "analyze_chunk", "audio_data": [0.0, 0.0, 0.0]}"#);
        let value = reply(&response);
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["rms"], json!(0.0));
        assert_eq!(value["data"]["waveform"], json!([0.0, 0.0, 0.0]));
        assert!(value["data"]["spectral_centroid"].is_number());
    }

    #[test]
    fn test_missing_file() {
        let (response, _) = dispatcher()
            .handle(br#"{"command": "analyze_file", "file_path": "/nonexistent/a.wav"}"#);
        assert_eq!(
            reply(&response),
            json!({"status": "error", "message": "Failed to load audio file"})
        );
    }

    #[test]
    fn test_panic_message() {
        let cause: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(cause.as_ref()), "boom");
        let cause: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(cause.as_ref()), "bang");
        let cause: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(
            panic_message(cause.as_ref()),
            "Internal error while handling request"
        );
    }

    #[test]
    fn test_panicking_request_becomes_error_reply() {
        let (transport, _client) = ChannelTransport::pair(Duration::from_millis(10));
        let dispatcher = Dispatcher::new(transport, FragileHandler);

        let (response, control) =
            dispatcher.handle(br#"{"command": "analyze_file", "file_path": "/x.wav"}"#);
        assert_eq!(control, Control::Continue);
        assert_eq!(
            reply(&response),
            json!({"status": "error", "message": "decoder blew up on /x.wav"})
        );
    }

    #[test]
    fn test_serving_continues_after_panic() {
        let (transport, client) = ChannelTransport::pair(Duration::from_millis(10));
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let server = std::thread::spawn(move || {
            Dispatcher::new(transport, FragileHandler).serve(&flag)
        });

        let send = |body: Value| -> Value {
            serde_json::from_slice(&client.request(body.to_string().as_bytes()).unwrap()).unwrap()
        };

        let first = send(json!({"command": "analyze_file", "file_path": "/boom.wav"}));
        assert_eq!(first["status"], "error");
        assert_eq!(first["message"], "decoder blew up on /boom.wav");

        let second = send(json!({"command": "analyze_chunk", "audio_data": [0.25, -0.25]}));
        assert_eq!(
            second,
            json!({
                "status": "success",
                "data": {"waveform": [0.25, -0.25], "rms": 0.5, "spectral_centroid": 1000.0}
            })
        );

        assert_eq!(send(json!({"command": "stop"})), json!({"status": "stopping"}));
        assert_eq!(server.join().unwrap().unwrap(), ServeOutcome::Stopped);
        assert!(!shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interrupted_before_any_request() {
        let mut dispatcher = dispatcher();
        let shutdown = AtomicBool::new(true);
        assert_eq!(dispatcher.serve(&shutdown).unwrap(), ServeOutcome::Interrupted);
    }
}
