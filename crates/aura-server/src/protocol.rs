//! Wire protocol: JSON requests and replies
//!
//! Requests:
//!
//! ```text
//! {"command": "analyze_file",  "file_path": "<path>"}
//! {"command": "analyze_chunk", "audio_data": [..], "sample_rate": 44100}
//! {"command": "stop"}
//! ```
//!
//! Replies are `{"status": "success", "data": {..}}`,
//! `{"status": "error", "message": ".."}` or `{"status": "stopping"}`.

use std::path::PathBuf;

use aura_core::DEFAULT_SAMPLE_RATE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Request could not be turned into a command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Missing or invalid 'command' field")]
    MissingCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing or invalid '{0}' field")]
    InvalidField(&'static str),

    #[error("audio_data is empty")]
    EmptyAudio,
}

/// Decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    AnalyzeFile { file_path: PathBuf },
    AnalyzeChunk { audio_data: Vec<f32>, sample_rate: u32 },
    Stop,
}

impl Request {
    /// Parse a raw request payload
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| ProtocolError::Json(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingCommand)?;

        match command {
            "analyze_file" => {
                let file_path = value
                    .get("file_path")
                    .and_then(Value::as_str)
                    .ok_or(ProtocolError::InvalidField("file_path"))?;
                Ok(Request::AnalyzeFile {
                    file_path: PathBuf::from(file_path),
                })
            }
            "analyze_chunk" => {
                let audio_data = value
                    .get("audio_data")
                    .and_then(Value::as_array)
                    .ok_or(ProtocolError::InvalidField("audio_data"))?
                    .iter()
                    .map(|v| v.as_f64().map(|x| x as f32).filter(|x| x.is_finite()))
                    .collect::<Option<Vec<f32>>>()
                    .ok_or(ProtocolError::InvalidField("audio_data"))?;
                if audio_data.is_empty() {
                    return Err(ProtocolError::EmptyAudio);
                }

                let sample_rate = match value.get("sample_rate") {
                    None | Some(Value::Null) => DEFAULT_SAMPLE_RATE,
                    Some(v) => parse_sample_rate(v)
                        .ok_or(ProtocolError::InvalidField("sample_rate"))?,
                };
                Ok(Request::AnalyzeChunk {
                    audio_data,
                    sample_rate,
                })
            }
            "stop" => Ok(Request::Stop),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    /// Command name, for logging
    pub fn command(&self) -> &'static str {
        match self {
            Request::AnalyzeFile { .. } => "analyze_file",
            Request::AnalyzeChunk { .. } => "analyze_chunk",
            Request::Stop => "stop",
        }
    }
}

/// Positive integral sample rate; `44100.0` is accepted like `44100`
fn parse_sample_rate(value: &Value) -> Option<u32> {
    let rate = match value.as_u64() {
        Some(rate) => rate,
        None => {
            let rate = value.as_f64()?;
            if rate.fract() != 0.0 || rate < 0.0 || rate > u32::MAX as f64 {
                return None;
            }
            rate as u64
        }
    };
    u32::try_from(rate).ok().filter(|&sr| sr > 0)
}

/// Reply sent for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success { data: Value },
    Error { message: String },
    Stopping,
}

impl Response {
    /// Success reply carrying `data`
    ///
    /// Non-finite floats serialize as `null`; they are written as 0.0 so
    /// every numeric field stays a number.
    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(mut value) => {
                replace_nulls(&mut value);
                Response::Success { data: value }
            }
            Err(e) => Response::error(format!("Failed to serialize result: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Encoded reply
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            log::error!("Failed to encode reply: {}", e);
            br#"{"status":"error","message":"Failed to encode reply"}"#.to_vec()
        })
    }
}

fn replace_nulls(value: &mut Value) {
    match value {
        Value::Null => *value = Value::from(0.0),
        Value::Array(items) => items.iter_mut().for_each(replace_nulls),
        Value::Object(map) => map.values_mut().for_each(replace_nulls),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<Request, ProtocolError> {
        Request::parse(value.to_string().as_bytes())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(json!({"command": "stop"})), Ok(Request::Stop));
        assert_eq!(
            parse(json!({"command": "analyze_file", "file_path": "/tmp/a.wav"})),
            Ok(Request::AnalyzeFile {
                file_path: PathBuf::from("/tmp/a.wav")
            })
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [0.5, -1, 0]})),
            Ok(Request::AnalyzeChunk {
                audio_data: vec![0.5, -1.0, 0.0],
                sample_rate: 44100
            })
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [0.1], "sample_rate": 22050})),
            Ok(Request::AnalyzeChunk {
                audio_data: vec![0.1],
                sample_rate: 22050
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(json!({"foo": 1})), Err(ProtocolError::MissingCommand));
        assert_eq!(parse(json!({"command": 3})), Err(ProtocolError::MissingCommand));
        assert_eq!(parse(json!([1, 2])), Err(ProtocolError::MissingCommand));
        assert_eq!(
            parse(json!({"command": "dance"})),
            Err(ProtocolError::UnknownCommand("dance".to_string()))
        );
        assert_eq!(
            parse(json!({"command": "analyze_file"})),
            Err(ProtocolError::InvalidField("file_path"))
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": ["x"]})),
            Err(ProtocolError::InvalidField("audio_data"))
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": []})),
            Err(ProtocolError::EmptyAudio)
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [0.1], "sample_rate": 0})),
            Err(ProtocolError::InvalidField("sample_rate"))
        );
        assert!(matches!(
            Request::parse(b"{not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_float_sample_rate() {
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [0.1], "sample_rate": 44100.0})),
            Ok(Request::AnalyzeChunk {
                audio_data: vec![0.1],
                sample_rate: 44100
            })
        );
        for bad in [json!(44100.5), json!(-1.0), json!(0.0), json!(1e12), json!("44100")] {
            assert_eq!(
                parse(json!({"command": "analyze_chunk", "audio_data": [0.1], "sample_rate": bad})),
                Err(ProtocolError::InvalidField("sample_rate")),
                "sample_rate {}",
                bad
            );
        }
    }

    #[test]
    fn test_out_of_range_samples_rejected() {
        // 1e39 does not fit in an f32
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [1e39, 0.2]})),
            Err(ProtocolError::InvalidField("audio_data"))
        );
        assert_eq!(
            parse(json!({"command": "analyze_chunk", "audio_data": [-1e39]})),
            Err(ProtocolError::InvalidField("audio_data"))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProtocolError::UnknownCommand("dance".into()).to_string(),
            "Unknown command: dance"
        );
        assert_eq!(
            ProtocolError::MissingCommand.to_string(),
            "Missing or invalid 'command' field"
        );
    }

    #[test]
    fn test_response_shapes() {
        let stopping: Value = serde_json::from_slice(&Response::Stopping.to_bytes()).unwrap();
        assert_eq!(stopping, json!({"status": "stopping"}));

        let error: Value = serde_json::from_slice(&Response::error("boom").to_bytes()).unwrap();
        assert_eq!(error, json!({"status": "error", "message": "boom"}));

        let success: Value =
            serde_json::from_slice(&Response::success(&json!({"rms": 0.5})).to_bytes()).unwrap();
        assert_eq!(success, json!({"status": "success", "data": {"rms": 0.5}}));
    }

    #[test]
    fn test_non_finite_becomes_zero() {
        #[derive(Serialize)]
        struct Data {
            rms: f32,
            series: Vec<f32>,
        }
        let response = Response::success(&Data {
            rms: f32::NAN,
            series: vec![1.0, f32::INFINITY],
        });
        let value: Value = serde_json::from_slice(&response.to_bytes()).unwrap();
        assert_eq!(value["data"]["rms"], json!(0.0));
        assert_eq!(value["data"]["series"], json!([1.0, 0.0]));
    }
}
