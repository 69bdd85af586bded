// src/session/mod.rs
// Translation Session - the application context wiring gateway, table,
// editor, synchronizer and controls together

use crate::config::{ClientSettings, ConfigError};
use crate::config_store::ConfigStore;
use crate::editor::CellEditor;
use crate::gateway::{
    with_deadline, Ack, AudioRole, CancellationToken, GatewayError, HttpGateway, ModelsStatus,
    ServerApi, UploadReceipt, VideoUpload, MAX_UPLOAD_BYTES,
};
use crate::segments::{
    srt, CellKey, ConfirmGate, FieldValue, SegmentField, SegmentStore, TableError,
};
use crate::sync::{LogPoller, PollOutcome, ProgressSynchronizer};
use crate::view::{ActivityLog, Control, ControlBoard, Reporter, UiSink, UiUpdate};
use crate::waveform::{PlaybackEvent, PlaybackFrame, WaveformRenderer};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;

pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} is already in progress")]
    Busy(Control),

    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct Session {
    settings: ClientSettings,
    api: Arc<dyn ServerApi>,
    store: SegmentStore,
    config: ConfigStore,
    editor: CellEditor,
    sync: Arc<ProgressSynchronizer>,
    logs: Arc<LogPoller>,
    renderer: Arc<TokioMutex<WaveformRenderer>>,
    controls: Arc<ControlBoard>,
    reporter: Reporter,
}

impl Session {
    /// Session talking to the server named in `settings`.
    pub fn connect(settings: ClientSettings, sink: Arc<dyn UiSink>) -> Result<Self, SessionError> {
        let gateway = HttpGateway::new(&settings)?;
        Ok(Self::new(settings, Arc::new(gateway), sink))
    }

    pub fn new(settings: ClientSettings, api: Arc<dyn ServerApi>, sink: Arc<dyn UiSink>) -> Self {
        let reporter = Reporter::new(Arc::new(ActivityLog::default()), sink.clone());
        let store = SegmentStore::new(api.clone());
        let renderer = Arc::new(TokioMutex::new(WaveformRenderer::default()));
        let controls = ControlBoard::new(sink);

        let sync = ProgressSynchronizer::new(
            api.clone(),
            store.clone(),
            renderer.clone(),
            controls.clone(),
            reporter.clone(),
            settings.poll_interval,
        );
        let logs = LogPoller::new(api.clone(), reporter.clone(), settings.log_poll_interval);
        let config = ConfigStore::new(api.clone(), reporter.clone(), settings.save_debounce);
        let editor = CellEditor::new(store.clone(), reporter.clone());

        Self {
            settings,
            api,
            store,
            config,
            editor,
            sync,
            logs,
            renderer,
            controls,
            reporter,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn editor(&self) -> &CellEditor {
        &self.editor
    }

    pub fn synchronizer(&self) -> &Arc<ProgressSynchronizer> {
        &self.sync
    }

    pub fn log_poller(&self) -> &Arc<LogPoller> {
        &self.logs
    }

    pub fn controls(&self) -> &Arc<ControlBoard> {
        &self.controls
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Uploads a local video. Format and size are checked before the file
    /// is read; the upload control is disabled until this returns.
    pub async fn upload_video(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<UploadReceipt, SessionError> {
        let _guard = self
            .controls
            .acquire(Control::Upload)
            .ok_or(SessionError::Busy(Control::Upload))?;

        let result = self.upload_inner(path, token).await;
        match &result {
            Ok(receipt) => self
                .reporter
                .success(&format!("Uploaded {}", receipt.filename)),
            Err(e) => self.reporter.error("Upload failed", e),
        }
        result
    }

    async fn upload_inner(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<UploadReceipt, SessionError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return Err(SessionError::UnsupportedFormat(file_name));
        }

        let size = tokio::fs::metadata(path).await?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(GatewayError::Validation(format!(
                "{} is {} MB, the limit is {} MB",
                file_name,
                size / (1024 * 1024),
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ))
            .into());
        }

        let bytes = tokio::fs::read(path).await?;
        let upload = VideoUpload { file_name, bytes };
        let receipt = with_deadline(
            token,
            self.settings.upload_timeout,
            self.api.upload_video(upload),
        )
        .await?;
        Ok(receipt)
    }

    /// Asks the server to start the pipeline. On success the start control
    /// stays disabled until the synchronizer sees the job end.
    pub async fn start_processing(&self, token: &CancellationToken) -> Result<Ack, SessionError> {
        let guard = self
            .controls
            .acquire(Control::StartProcessing)
            .ok_or(SessionError::Busy(Control::StartProcessing))?;

        match with_deadline(
            token,
            self.settings.request_timeout,
            self.api.start_processing(),
        )
        .await
        {
            Ok(ack) => {
                guard.keep_disabled();
                self.reporter.info(
                    ack.message
                        .as_deref()
                        .unwrap_or("Processing started"),
                );
                self.sync.start();
                Ok(ack)
            }
            Err(e) => {
                self.reporter.error("Starting processing failed", &e);
                Err(e.into())
            }
        }
    }

    /// One synchronizer cycle outside the poll loop.
    pub async fn refresh(&self) -> PollOutcome {
        self.sync.poll_once().await
    }

    pub async fn edit_cell(
        &self,
        sequence: u32,
        field: SegmentField,
        text: &str,
    ) -> Result<FieldValue, SessionError> {
        let cell = CellKey::new(field, sequence);
        self.editor.begin_edit(cell).await?;
        self.editor.input(text);
        match self.editor.commit().await {
            Some(result) => Ok(result?),
            None => Err(TableError::NotFound(sequence).into()),
        }
    }

    pub async fn insert_row(&self, after: Option<u32>) -> Result<u32, SessionError> {
        let sequence = self.store.insert_row(after).await?;
        self.emit_rebuilt().await;
        Ok(sequence)
    }

    pub async fn delete_row(
        &self,
        sequence: u32,
        gate: &(dyn ConfirmGate + Sync),
    ) -> Result<bool, SessionError> {
        let deleted = self.store.delete_row(sequence, gate).await?;
        if deleted {
            self.emit_rebuilt().await;
        }
        Ok(deleted)
    }

    pub async fn regenerate(&self, sequence: u32) -> Result<Ack, SessionError> {
        if self.store.lock().await.get(sequence).is_none() {
            return Err(TableError::NotFound(sequence).into());
        }
        match self.api.regenerate_segment(sequence).await {
            Ok(ack) => {
                self.reporter.success(
                    ack.message
                        .as_deref()
                        .unwrap_or("Segment regenerated"),
                );
                self.sync.poll_once().await;
                Ok(ack)
            }
            Err(e) => {
                self.reporter
                    .error(&format!("Regenerating segment {} failed", sequence), &e);
                Err(e.into())
            }
        }
    }

    /// Sends a local SRT file to the server and rebuilds the table from
    /// the segments it returns.
    pub async fn import_srt(&self, path: &Path) -> Result<usize, SessionError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitles.srt".to_string());
        let content = tokio::fs::read(path).await?;

        let imported = match self.api.import_srt(&file_name, content).await {
            Ok(imported) => imported,
            Err(e) => {
                self.reporter.error("SRT import failed", &e);
                return Err(e.into());
            }
        };

        let count = imported.segments.len();
        self.store.replace_all(imported.segments).await;
        self.emit_rebuilt().await;
        self.reporter
            .success(&format!("Imported {} segments from {}", count, file_name));
        Ok(count)
    }

    /// Downloads the server's SRT into `dir`. With `offline` the table is
    /// formatted locally instead.
    pub async fn export_srt(&self, dir: &Path, offline: bool) -> Result<PathBuf, SessionError> {
        let bytes = if offline {
            srt::format(&self.store.lock().await.segments()).into_bytes()
        } else {
            match self.api.export_srt().await {
                Ok(blob) => blob.as_slice().to_vec(),
                Err(e) => {
                    self.reporter.error("SRT export failed", &e);
                    return Err(e.into());
                }
            }
        };

        let target = dir.join(srt::export_file_name(Local::now()));
        tokio::fs::write(&target, bytes).await?;
        self.reporter
            .success(&format!("Subtitles saved to {}", target.display()));
        Ok(target)
    }

    pub async fn download_video(&self, target: &Path) -> Result<usize, SessionError> {
        let video = match self.api.download_video().await {
            Ok(video) => video,
            Err(e) => {
                self.reporter.error("Video download failed", &e);
                return Err(e.into());
            }
        };
        tokio::fs::write(target, video.as_slice()).await?;
        self.reporter
            .success(&format!("Video saved to {}", target.display()));
        Ok(video.len())
    }

    pub async fn preview_video(&self) -> Result<usize, SessionError> {
        let video = self.api.fetch_video_preview().await?;
        self.reporter.sink().emit(UiUpdate::VideoPreview { bytes: video.len() });
        Ok(video.len())
    }

    pub async fn models(&self) -> Result<ModelsStatus, SessionError> {
        self.api.models_status().await.map_err(|e| {
            self.reporter.error("Model status unavailable", &e);
            e.into()
        })
    }

    pub async fn clear_logs(&self) -> Result<(), SessionError> {
        match self.api.clear_logs().await {
            Ok(_) => {
                self.logs.reset();
                self.reporter.info("Server log cleared");
                Ok(())
            }
            Err(e) => {
                self.reporter.error("Clearing logs failed", &e);
                Err(e.into())
            }
        }
    }

    /// Routes a player event to the overlay of `role`. `Ended` redraws the
    /// cached waveform; nothing is decoded again.
    pub async fn playback(&self, role: AudioRole, event: PlaybackEvent) -> Option<PlaybackFrame> {
        let renderer = self.renderer.lock().await;
        let sink = self.reporter.sink();
        match event {
            PlaybackEvent::Ended => {
                let base = renderer.pixels(role)?.clone();
                if let Some(state) = renderer.state(role) {
                    sink.emit(UiUpdate::Waveform {
                        role,
                        state: state.clone(),
                    });
                }
                sink.emit(UiUpdate::PlaybackOverlayCleared { role });
                Some(PlaybackFrame::Restored(base))
            }
            _ => {
                let frame = renderer.overlay(role, event)?;
                sink.emit(UiUpdate::PlaybackOverlay {
                    role,
                    cursor_x: frame.cursor_x,
                    label: frame.label.clone(),
                });
                Some(PlaybackFrame::Cursor(frame))
            }
        }
    }

    /// Forgets client-side derived state: polling, audio and waveform
    /// caches, open edits, the log cursor, the table.
    pub async fn reset(&self) {
        self.sync.stop();
        self.sync.reset().await;
        self.editor.discard().await;
        self.logs.reset();
        self.store.replace_all(Vec::new()).await;
        self.emit_rebuilt().await;
        self.controls.set(Control::StartProcessing, true);
        self.controls.set(Control::Upload, true);
        tracing::info!("Client state reset");
    }

    pub fn shutdown(&self) {
        self.sync.stop();
        self.logs.stop();
    }

    async fn emit_rebuilt(&self) {
        let table = self.store.lock().await;
        self.reporter.sink().emit(UiUpdate::TableRebuilt {
            revision: table.revision(),
            rows: table.len(),
        });
    }
}
