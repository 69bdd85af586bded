// src/sync/mod.rs
// Progress Synchronizer - polls server state while a job runs and folds
// each snapshot into the table, the waveforms and the controls

mod audio_cache;
pub mod debounce;
pub mod logs;

pub use audio_cache::AudioPathCache;
pub use debounce::Debouncer;
pub use logs::LogPoller;

use crate::gateway::{AudioRole, ProcessingSnapshot, ProcessingStatus, ServerApi};
use crate::segments::SegmentStore;
use crate::view::{Control, ControlBoard, Reporter, UiSink, UiUpdate};
use crate::waveform::{self, WaveformError, WaveformRenderer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Job still running (or the request failed); poll again next tick
    Continue,
    Finished(ProcessingStatus),
}

pub struct ProgressSynchronizer {
    api: Arc<dyn ServerApi>,
    store: SegmentStore,
    renderer: Arc<TokioMutex<WaveformRenderer>>,
    audio_paths: TokioMutex<AudioPathCache>,
    controls: Arc<ControlBoard>,
    reporter: Reporter,
    sink: Arc<dyn UiSink>,
    interval: Duration,
    failing: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressSynchronizer {
    pub fn new(
        api: Arc<dyn ServerApi>,
        store: SegmentStore,
        renderer: Arc<TokioMutex<WaveformRenderer>>,
        controls: Arc<ControlBoard>,
        reporter: Reporter,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            store,
            renderer,
            audio_paths: TokioMutex::new(AudioPathCache::new()),
            controls,
            sink: reporter.sink(),
            reporter,
            interval,
            failing: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// One fetch-and-apply cycle. A failed request is reported and
    /// treated as "still running".
    pub async fn poll_once(&self) -> PollOutcome {
        let snapshot = match self.api.fetch_snapshot().await {
            Ok(snapshot) => {
                self.failing.store(false, Ordering::Relaxed);
                snapshot
            }
            Err(e) => {
                if !self.failing.swap(true, Ordering::Relaxed) {
                    self.reporter.error("Progress refresh failed", &e);
                } else {
                    tracing::debug!("Progress refresh still failing: {}", e);
                }
                return PollOutcome::Continue;
            }
        };

        self.apply(snapshot).await
    }

    /// Folds an already fetched snapshot into the view.
    pub async fn apply(&self, snapshot: ProcessingSnapshot) -> PollOutcome {
        self.sink.emit(UiUpdate::Progress {
            percent: snapshot.progress,
            step: snapshot.current_step.clone(),
        });
        self.sink.emit(UiUpdate::Status(snapshot.processing_status));

        if !snapshot.segments.is_empty() {
            let rows = snapshot.segments.len();
            let revision = self.store.merge_snapshot(snapshot.segments.clone()).await;
            self.sink.emit(UiUpdate::TableRebuilt { revision, rows });
        }

        self.refresh_waveforms(&snapshot).await;

        if snapshot.processing_status.is_terminal() {
            PollOutcome::Finished(snapshot.processing_status)
        } else {
            PollOutcome::Continue
        }
    }

    /// Starts the poll loop, replacing any running one. The loop ends by
    /// itself on the first terminal status.
    pub fn start(self: &Arc<Self>) {
        let sync = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let PollOutcome::Finished(status) = sync.poll_once().await {
                    sync.finish(status).await;
                    break;
                }
            }
        });

        if let Ok(mut guard) = self.task.lock() {
            if let Some(existing) = guard.take() {
                existing.abort();
            }
            *guard = Some(handle);
        }
        tracing::info!("Progress polling started every {:?}", self.interval);
    }

    /// Stops client-side polling only; the server job keeps running.
    pub fn stop(&self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
                tracing::info!("Progress polling stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Resolves once the current poll loop has ended.
    pub async fn wait(&self) {
        let handle = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub async fn reset(&self) {
        self.audio_paths.lock().await.reset();
        self.renderer.lock().await.clear();
    }

    async fn finish(&self, status: ProcessingStatus) {
        self.controls.set(Control::StartProcessing, true);

        match status {
            ProcessingStatus::Completed => {
                self.reporter.success("Processing completed");
                match self.api.fetch_video_preview().await {
                    Ok(video) => self.sink.emit(UiUpdate::VideoPreview { bytes: video.len() }),
                    Err(e) => self.reporter.error("Loading video preview failed", &e),
                }
            }
            _ => {
                tracing::error!("Server reported processing status {}", status);
                self.reporter.warn("Processing ended with an error");
            }
        }
    }

    async fn refresh_waveforms(&self, snapshot: &ProcessingSnapshot) {
        let changes = self.audio_paths.lock().await.changes(snapshot);
        for (role, path) in changes {
            self.audio_paths.lock().await.record(role, &path);
            self.redraw(role, &path).await;
        }
    }

    async fn redraw(&self, role: AudioRole, path: &str) {
        tracing::info!("Audio for {} changed to {}", role, path);
        let analyzed = match self.api.fetch_audio(path).await {
            Ok(blob) => {
                let columns = self.renderer.lock().await.columns();
                let source = path.to_string();
                tokio::task::spawn_blocking(move || {
                    waveform::analyze_source(&source, &blob, columns)
                })
                .await
                .unwrap_or_else(|e| Err(WaveformError::Decode(e.to_string())))
            }
            Err(e) => {
                self.reporter.error(&format!("Loading {} audio failed", role), &e);
                Err(WaveformError::Decode(e.to_string()))
            }
        };

        let state = self.renderer.lock().await.install(role, path, analyzed);
        self.sink.emit(UiUpdate::Waveform { role, state });
    }
}
