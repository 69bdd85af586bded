// src/gateway/http.rs
// reqwest-backed implementation of the server contract

use super::types::StatusReply;
use super::{
    Ack, GatewayError, ImportedSrt, LogEntry, MediaBlob, ModelsStatus, ProcessingSnapshot,
    ServerApi, UploadReceipt, VideoUpload,
};
use crate::config::{ClientSettings, ServerConfig};
use crate::segments::Segment;
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpGateway {
    base: Url,
    client: Client,
    upload_timeout: Duration,
}

#[derive(Serialize)]
struct SegmentsPayload<'a> {
    segments: &'a [Segment],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogsReply {
    Plain(Vec<LogEntry>),
    Wrapped { logs: Vec<LogEntry> },
}

impl HttpGateway {
    pub fn new(settings: &ClientSettings) -> Result<Self, GatewayError> {
        let base = Url::parse(&settings.server_url)
            .map_err(|e| GatewayError::Validation(format!("bad server url: {}", e)))?;

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        tracing::info!("HTTP gateway initialized for {}", base);

        Ok(Self {
            base,
            client,
            upload_timeout: settings.upload_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Validation(format!("bad endpoint {}: {}", path, e)))
    }

    /// The whole server-side path travels as one percent-encoded segment.
    fn audio_url(&self, audio_path: &str) -> Result<Url, GatewayError> {
        let mut url = self.endpoint("/api/audio/")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::Validation("server url cannot be a base".into()))?;
            segments.pop_if_empty().push(audio_path);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = server_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        tracing::warn!("Server answered HTTP {}: {}", status.as_u16(), message);
        Err(GatewayError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.get(url)).await?;
        decode_json(response).await
    }

    async fn get_blob(&self, url: Url) -> Result<MediaBlob, GatewayError> {
        let response = self.send(self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;
        Ok(MediaBlob::new(bytes.to_vec()))
    }

    async fn post_command(&self, request: RequestBuilder) -> Result<StatusReply, GatewayError> {
        let response = self.send(request).await?;
        let reply: StatusReply = decode_json(response).await?;
        reply.into_result()
    }
}

#[async_trait]
impl ServerApi for HttpGateway {
    async fn load_config(&self) -> Result<ServerConfig, GatewayError> {
        self.get_json("/api/config").await
    }

    async fn save_config(&self, config: &ServerConfig) -> Result<Ack, GatewayError> {
        let url = self.endpoint("/api/config")?;
        let reply = self.post_command(self.client.post(url).json(config)).await?;
        Ok(Ack {
            message: reply.message,
        })
    }

    async fn upload_video(&self, upload: VideoUpload) -> Result<UploadReceipt, GatewayError> {
        let url = self.endpoint("/api/upload")?;
        let size = upload.bytes.len();
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(video_mime(&upload.file_name))
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let form = multipart::Form::new().part("video", part);

        tracing::info!("Uploading {} ({} bytes)", upload.file_name, size);

        let request = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.upload_timeout);
        let reply = self.post_command(request).await?;

        Ok(UploadReceipt {
            filename: reply.filename.unwrap_or(upload.file_name),
            file_path: reply.file_path,
        })
    }

    async fn start_processing(&self) -> Result<Ack, GatewayError> {
        let url = self.endpoint("/api/process/professional")?;
        let reply = self.post_command(self.client.post(url)).await?;
        Ok(Ack {
            message: reply.message,
        })
    }

    async fn fetch_snapshot(&self) -> Result<ProcessingSnapshot, GatewayError> {
        self.get_json("/api/data").await
    }

    async fn save_segments(&self, segments: &[Segment]) -> Result<Ack, GatewayError> {
        let url = self.endpoint("/api/data")?;
        let payload = SegmentsPayload { segments };
        let reply = self.post_command(self.client.post(url).json(&payload)).await?;
        Ok(Ack {
            message: reply.message,
        })
    }

    async fn regenerate_segment(&self, sequence: u32) -> Result<Ack, GatewayError> {
        let url = self.endpoint(&format!("/api/regenerate/{}", sequence))?;
        let reply = self.post_command(self.client.post(url)).await?;
        Ok(Ack {
            message: reply.message,
        })
    }

    async fn import_srt(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<ImportedSrt, GatewayError> {
        let url = self.endpoint("/api/srt/import")?;
        let part = multipart::Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/x-subrip")
            .map_err(|e| GatewayError::Validation(e.to_string()))?;
        let form = multipart::Form::new().part("srt_file", part);

        let reply = self.post_command(self.client.post(url).multipart(form)).await?;
        Ok(ImportedSrt {
            segments: reply.segments.unwrap_or_default(),
            message: reply.message,
        })
    }

    async fn export_srt(&self) -> Result<MediaBlob, GatewayError> {
        let url = self.endpoint("/api/srt/export")?;
        self.get_blob(url).await
    }

    async fn fetch_video_preview(&self) -> Result<MediaBlob, GatewayError> {
        let url = self.endpoint("/api/video/preview")?;
        self.get_blob(url).await
    }

    async fn download_video(&self) -> Result<MediaBlob, GatewayError> {
        let url = self.endpoint("/api/download/video")?;
        self.get_blob(url).await
    }

    async fn fetch_audio(&self, path: &str) -> Result<MediaBlob, GatewayError> {
        let url = self.audio_url(path)?;
        self.get_blob(url).await
    }

    async fn models_status(&self) -> Result<ModelsStatus, GatewayError> {
        let status: ModelsStatus = self.get_json("/api/models/status").await?;
        if status.status.eq_ignore_ascii_case("error") {
            return Err(GatewayError::Server {
                status: 200,
                message: "model status unavailable".to_string(),
            });
        }
        Ok(status)
    }

    async fn fetch_logs(&self) -> Result<Vec<LogEntry>, GatewayError> {
        let reply: LogsReply = self.get_json("/api/logs").await?;
        Ok(match reply {
            LogsReply::Plain(entries) => entries,
            LogsReply::Wrapped { logs } => logs,
        })
    }

    async fn clear_logs(&self) -> Result<Ack, GatewayError> {
        let url = self.endpoint("/api/logs/clear")?;
        let reply = self.post_command(self.client.post(url)).await?;
        Ok(Ack {
            message: reply.message,
        })
    }
}

fn map_transport(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let bytes = response.bytes().await.map_err(map_transport)?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Prefer the JSON `message`, fall back to the raw text body.
fn server_message(body: &str) -> Option<String> {
    if let Ok(reply) = serde_json::from_str::<StatusReply>(body) {
        if let Some(message) = reply.message.filter(|m| !m.trim().is_empty()) {
            return Some(message);
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn video_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        _ => "application/octet-stream",
    }
}
