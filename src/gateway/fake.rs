// In-memory ServerApi used by the component tests

use super::{
    Ack, GatewayError, ImportedSrt, LogEntry, MediaBlob, ModelInfo, ModelsStatus,
    ProcessingSnapshot, ServerApi, UploadReceipt, VideoUpload,
};
use crate::config::ServerConfig;
use crate::segments::{srt, Segment};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub(crate) const PREVIEW_BYTES: &[u8] = b"fake-preview-video";

#[derive(Default)]
struct FakeState {
    current: ProcessingSnapshot,
    scripted: VecDeque<Result<ProcessingSnapshot, GatewayError>>,
    failures: HashMap<&'static str, GatewayError>,
    calls: Vec<&'static str>,
    saved_segments: Vec<Vec<Segment>>,
    saved_configs: Vec<ServerConfig>,
    config: ServerConfig,
    audio: HashMap<String, Vec<u8>>,
    audio_requests: Vec<String>,
    logs: VecDeque<LogEntry>,
    log_capacity: Option<usize>,
    uploads: Vec<String>,
}

/// Scriptable server double. Every trait call is recorded by name.
#[derive(Default)]
pub(crate) struct FakeServer {
    state: Mutex<FakeState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments(segments: Vec<Segment>) -> Self {
        let server = Self::new();
        {
            let mut state = server.state.lock().unwrap();
            state.current.segment_count = segments.len();
            state.current.segments = segments;
        }
        server
    }

    /// Queues the next answers of `fetch_snapshot`; once drained the last
    /// successful one keeps being served.
    pub fn script_snapshot(&self, snapshot: Result<ProcessingSnapshot, GatewayError>) {
        self.state.lock().unwrap().scripted.push_back(snapshot);
    }

    /// Fails the next call of `operation` (trait method name) once.
    pub fn fail_next(&self, operation: &'static str, err: GatewayError) {
        self.state.lock().unwrap().failures.insert(operation, err);
    }

    pub fn put_audio(&self, path: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .audio
            .insert(path.to_string(), bytes);
    }

    pub fn set_config(&self, config: ServerConfig) {
        self.state.lock().unwrap().config = config;
    }

    pub fn push_log(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        let entry = LogEntry {
            timestamp: format!("2026-10-18 10:00:{:02}", state.logs.len() % 60),
            level: "INFO".to_string(),
            message: message.to_string(),
            trace_id: None,
        };
        state.logs.push_back(entry);
        if let Some(capacity) = state.log_capacity {
            while state.logs.len() > capacity {
                state.logs.pop_front();
            }
        }
    }

    /// Bounds the log like the server does; oldest entries drop first.
    pub fn cap_logs(&self, capacity: usize) {
        self.state.lock().unwrap().log_capacity = Some(capacity);
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    pub fn saved_collections(&self) -> Vec<Vec<Segment>> {
        self.state.lock().unwrap().saved_segments.clone()
    }

    pub fn saved_configs(&self) -> Vec<ServerConfig> {
        self.state.lock().unwrap().saved_configs.clone()
    }

    pub fn audio_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().audio_requests.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.state.lock().unwrap().current.segments.clone()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, FakeState>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation);
        let failure = state.failures.remove(operation);
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn ok() -> Ack {
    Ack {
        message: Some("ok".to_string()),
    }
}

#[async_trait]
impl ServerApi for FakeServer {
    async fn load_config(&self) -> Result<ServerConfig, GatewayError> {
        let state = self.enter("load_config")?;
        Ok(state.config.clone())
    }

    async fn save_config(&self, config: &ServerConfig) -> Result<Ack, GatewayError> {
        let mut state = self.enter("save_config")?;
        state.saved_configs.push(config.clone());
        state.config = config.clone();
        Ok(ok())
    }

    async fn upload_video(&self, upload: VideoUpload) -> Result<UploadReceipt, GatewayError> {
        let mut state = self.enter("upload_video")?;
        state.uploads.push(upload.file_name.clone());
        state.current.video_filename = Some(upload.file_name.clone());
        Ok(UploadReceipt {
            file_path: Some(format!("./uploads/{}", upload.file_name)),
            filename: upload.file_name,
        })
    }

    async fn start_processing(&self) -> Result<Ack, GatewayError> {
        self.enter("start_processing")?;
        Ok(Ack {
            message: Some("processing started".to_string()),
        })
    }

    async fn fetch_snapshot(&self) -> Result<ProcessingSnapshot, GatewayError> {
        let mut state = self.enter("fetch_snapshot")?;
        match state.scripted.pop_front() {
            Some(Ok(snapshot)) => {
                state.current = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(err)) => Err(err),
            None => Ok(state.current.clone()),
        }
    }

    async fn save_segments(&self, segments: &[Segment]) -> Result<Ack, GatewayError> {
        let mut state = self.enter("save_segments")?;
        state.saved_segments.push(segments.to_vec());
        state.current.segments = segments.to_vec();
        state.current.segment_count = segments.len();
        Ok(ok())
    }

    async fn regenerate_segment(&self, sequence: u32) -> Result<Ack, GatewayError> {
        let state = self.enter("regenerate_segment")?;
        if !state.current.segments.iter().any(|s| s.sequence == sequence) {
            return Err(GatewayError::Server {
                status: 404,
                message: format!("segment {} not found", sequence),
            });
        }
        Ok(Ack {
            message: Some(format!("segment {} regenerated", sequence)),
        })
    }

    async fn import_srt(
        &self,
        _file_name: &str,
        content: Vec<u8>,
    ) -> Result<ImportedSrt, GatewayError> {
        let mut state = self.enter("import_srt")?;
        let text = String::from_utf8(content)
            .map_err(|_| GatewayError::Server {
                status: 400,
                message: "SRT file is not UTF-8".to_string(),
            })?;
        let segments = srt::parse(&text);
        state.current.segment_count = segments.len();
        state.current.segments = segments.clone();
        Ok(ImportedSrt {
            message: Some(format!("imported {} segments", segments.len())),
            segments,
        })
    }

    async fn export_srt(&self) -> Result<MediaBlob, GatewayError> {
        let state = self.enter("export_srt")?;
        Ok(MediaBlob::new(
            srt::format(&state.current.segments).into_bytes(),
        ))
    }

    async fn fetch_video_preview(&self) -> Result<MediaBlob, GatewayError> {
        self.enter("fetch_video_preview")?;
        Ok(MediaBlob::new(PREVIEW_BYTES.to_vec()))
    }

    async fn download_video(&self) -> Result<MediaBlob, GatewayError> {
        self.enter("download_video")?;
        Ok(MediaBlob::new(PREVIEW_BYTES.to_vec()))
    }

    async fn fetch_audio(&self, path: &str) -> Result<MediaBlob, GatewayError> {
        let mut state = self.enter("fetch_audio")?;
        state.audio_requests.push(path.to_string());
        match state.audio.get(path) {
            Some(bytes) => Ok(MediaBlob::new(bytes.clone())),
            None => Err(GatewayError::Server {
                status: 404,
                message: format!("audio not found: {}", path),
            }),
        }
    }

    async fn models_status(&self) -> Result<ModelsStatus, GatewayError> {
        self.enter("models_status")?;
        let mut status = ModelsStatus {
            status: "success".to_string(),
            ..Default::default()
        };
        status.models.insert(
            "asr".to_string(),
            ModelInfo {
                available: true,
                description: "speech recognition".to_string(),
            },
        );
        status.models.insert(
            "separator".to_string(),
            ModelInfo {
                available: false,
                description: "vocal separation".to_string(),
            },
        );
        Ok(status)
    }

    async fn fetch_logs(&self) -> Result<Vec<LogEntry>, GatewayError> {
        let state = self.enter("fetch_logs")?;
        Ok(state.logs.iter().cloned().collect())
    }

    async fn clear_logs(&self) -> Result<Ack, GatewayError> {
        let mut state = self.enter("clear_logs")?;
        state.logs.clear();
        Ok(ok())
    }
}

/// Mono 16-bit PCM WAV holding a sine tone
pub(crate) fn sine_wav(sample_rate: u32, millis: u32, amplitude: f32) -> Vec<u8> {
    let channels: u16 = 1;
    let sample_count = (sample_rate as u64 * millis as u64 / 1000) as usize;
    let mut wav = Vec::with_capacity(44 + sample_count * 2);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + sample_count * 2) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    wav.extend_from_slice(&(channels * 2).to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&((sample_count * 2) as u32).to_le_bytes());
    for n in 0..sample_count {
        let t = n as f32 / sample_rate as f32;
        let value = (t * 440.0 * std::f32::consts::TAU).sin() * amplitude;
        let sample = (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}
