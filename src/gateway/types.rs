// src/gateway/types.rs
// Gateway wire types and error definitions

use crate::segments::Segment;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Normalized failure of any server call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Rejected before sending: {0}")]
    Validation(String),
}

impl GatewayError {
    /// True when the request never produced a server answer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Timeout | GatewayError::Cancelled
        )
    }
}

/// Envelope shared by every JSON status reply (`{status, message?, ...}`)
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct StatusReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub segments: Option<Vec<Segment>>,
}

impl StatusReply {
    /// HTTP 200 with `{status: "error"}` is still a server failure.
    pub fn into_result(self) -> Result<Self, GatewayError> {
        if self.status.eq_ignore_ascii_case("error") {
            return Err(GatewayError::Server {
                status: 200,
                message: self
                    .message
                    .unwrap_or_else(|| "server reported an error".to_string()),
            });
        }
        Ok(self)
    }
}

/// Acknowledgement of a command endpoint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ack {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub filename: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSrt {
    pub segments: Vec<Segment>,
    pub message: Option<String>,
}

/// Video file queued for upload
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[serde(alias = "processing")]
    Running,
    Completed,
    Error,
    /// Anything the server reports that this client does not know
    #[default]
    #[serde(other)]
    Idle,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessingStatus::Idle => "idle",
            ProcessingStatus::Running => "running",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// The four audio streams the server may expose for preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioRole {
    Vocals,
    Background,
    Synthesized,
    FinalMixed,
}

impl AudioRole {
    pub const ALL: [AudioRole; 4] = [
        AudioRole::Vocals,
        AudioRole::Background,
        AudioRole::Synthesized,
        AudioRole::FinalMixed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AudioRole::Vocals => "vocals",
            AudioRole::Background => "background",
            AudioRole::Synthesized => "synthesized",
            AudioRole::FinalMixed => "final_mixed",
        }
    }
}

impl fmt::Display for AudioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One polled server state report. Never mutated after decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSnapshot {
    pub processing_status: ProcessingStatus,
    #[serde(deserialize_with = "percent")]
    pub progress: u8,
    pub current_step: String,
    pub segment_count: usize,
    pub segments: Vec<Segment>,
    pub video_filename: Option<String>,
    pub total_duration: f64,

    pub vocals_audio_available: bool,
    pub vocals_audio_path: Option<String>,
    pub background_audio_available: bool,
    pub background_audio_path: Option<String>,
    pub synthesized_audio_available: bool,
    pub synthesized_audio_path: Option<String>,
    pub final_mixed_audio_available: bool,
    pub final_mixed_audio_path: Option<String>,
}

impl ProcessingSnapshot {
    /// Path for a role, only when the server marks it available
    pub fn audio_source(&self, role: AudioRole) -> Option<&str> {
        let (available, path) = match role {
            AudioRole::Vocals => (self.vocals_audio_available, &self.vocals_audio_path),
            AudioRole::Background => {
                (self.background_audio_available, &self.background_audio_path)
            }
            AudioRole::Synthesized => {
                (self.synthesized_audio_available, &self.synthesized_audio_path)
            }
            AudioRole::FinalMixed => {
                (self.final_mixed_audio_available, &self.final_mixed_audio_path)
            }
        };
        if !available {
            return None;
        }
        path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if !raw.is_finite() {
        return Ok(0);
    }
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelsStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub models: BTreeMap<String, ModelInfo>,
}

/// Binary payload (video, audio) passed around without copying
#[derive(Clone, PartialEq)]
pub struct MediaBlob(pub Arc<Vec<u8>>);

impl MediaBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaBlob({} bytes)", self.0.len())
    }
}
