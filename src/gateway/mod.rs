// src/gateway/mod.rs
// HTTP Gateway - every call the client makes to the translation server

mod cancel;
#[cfg(test)]
pub(crate) mod fake;
mod http;
mod types;

pub use cancel::with_deadline;
pub use http::HttpGateway;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    Ack, AudioRole, GatewayError, ImportedSrt, LogEntry, MediaBlob, ModelInfo, ModelsStatus,
    ProcessingSnapshot, ProcessingStatus, UploadReceipt, VideoUpload,
};

use crate::config::ServerConfig;
use crate::segments::Segment;
use async_trait::async_trait;

/// Largest video the client agrees to upload
pub const MAX_UPLOAD_BYTES: u64 = 300 * 1024 * 1024;

/// Server contract consumed by the client. One method per endpoint.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// `GET /api/config`
    async fn load_config(&self) -> Result<ServerConfig, GatewayError>;

    /// `POST /api/config`
    async fn save_config(&self, config: &ServerConfig) -> Result<Ack, GatewayError>;

    /// `POST /api/upload` (multipart field `video`)
    async fn upload_video(&self, upload: VideoUpload) -> Result<UploadReceipt, GatewayError>;

    /// `POST /api/process/professional`
    async fn start_processing(&self) -> Result<Ack, GatewayError>;

    /// `GET /api/data`
    async fn fetch_snapshot(&self) -> Result<ProcessingSnapshot, GatewayError>;

    /// `POST /api/data` with the whole segment collection
    async fn save_segments(&self, segments: &[Segment]) -> Result<Ack, GatewayError>;

    /// `POST /api/regenerate/{sequence}`
    async fn regenerate_segment(&self, sequence: u32) -> Result<Ack, GatewayError>;

    /// `POST /api/srt/import` (multipart field `srt_file`)
    async fn import_srt(&self, file_name: &str, content: Vec<u8>)
        -> Result<ImportedSrt, GatewayError>;

    /// `GET /api/srt/export`
    async fn export_srt(&self) -> Result<MediaBlob, GatewayError>;

    /// `GET /api/video/preview`
    async fn fetch_video_preview(&self) -> Result<MediaBlob, GatewayError>;

    /// `GET /api/download/video`
    async fn download_video(&self) -> Result<MediaBlob, GatewayError>;

    /// `GET /api/audio/{urlencoded path}`
    async fn fetch_audio(&self, path: &str) -> Result<MediaBlob, GatewayError>;

    /// `GET /api/models/status`
    async fn models_status(&self) -> Result<ModelsStatus, GatewayError>;

    /// `GET /api/logs`
    async fn fetch_logs(&self) -> Result<Vec<LogEntry>, GatewayError>;

    /// `POST /api/logs/clear`
    async fn clear_logs(&self) -> Result<Ack, GatewayError>;
}
