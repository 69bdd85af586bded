// Server log tail, polled independently of any job

use crate::gateway::{GatewayError, LogEntry, ServerApi};
use crate::view::{Reporter, UiSink, UiUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Identity of the newest entry already shown. The server keeps a bounded
/// log, so counts alone stop moving once it is full.
#[derive(Debug, Clone, PartialEq)]
struct LogCursor {
    /// Position the entry had when it was shown; it can only move left.
    index: usize,
    timestamp: String,
    message: String,
    trace_id: Option<String>,
}

impl LogCursor {
    fn at(index: usize, entry: &LogEntry) -> Self {
        Self {
            index,
            timestamp: entry.timestamp.clone(),
            message: entry.message.clone(),
            trace_id: entry.trace_id.clone(),
        }
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        self.timestamp == entry.timestamp
            && self.message == entry.message
            && self.trace_id == entry.trace_id
    }

    /// Index of the first unseen entry, or `None` when the shown entry
    /// is gone (log cleared or rotated past it).
    fn resume_in(&self, entries: &[LogEntry]) -> Option<usize> {
        let upper = self.index.min(entries.len().checked_sub(1)?);
        entries[..=upper]
            .iter()
            .rposition(|entry| self.matches(entry))
            .map(|found| found + 1)
    }
}

pub struct LogPoller {
    api: Arc<dyn ServerApi>,
    reporter: Reporter,
    sink: Arc<dyn UiSink>,
    interval: Duration,
    cursor: Mutex<Option<LogCursor>>,
    failing: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LogPoller {
    pub fn new(api: Arc<dyn ServerApi>, reporter: Reporter, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            api,
            sink: reporter.sink(),
            reporter,
            interval,
            cursor: Mutex::new(None),
            failing: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Dispatches entries not shown yet; returns how many. Losing track of
    /// the last shown entry means the log was cleared, so everything is
    /// shown again.
    pub async fn poll_once(&self) -> Result<usize, GatewayError> {
        let entries = match self.api.fetch_logs().await {
            Ok(entries) => {
                self.failing.store(false, Ordering::Relaxed);
                entries
            }
            Err(e) => {
                if !self.failing.swap(true, Ordering::Relaxed) {
                    self.reporter.error("Log refresh failed", &e);
                } else {
                    tracing::debug!("Log refresh still failing: {}", e);
                }
                return Err(e);
            }
        };

        let previous = self.cursor.lock().ok().and_then(|guard| guard.clone());
        let start = match previous {
            None => 0,
            Some(cursor) => match cursor.resume_in(&entries) {
                Some(start) => start,
                None => {
                    tracing::info!(
                        "Server log lost entry '{}', showing {} entries again",
                        cursor.message,
                        entries.len()
                    );
                    self.sink.emit(UiUpdate::ServerLogCleared);
                    0
                }
            },
        };

        let next = entries
            .last()
            .map(|last| LogCursor::at(entries.len() - 1, last));
        let fresh = entries.len() - start;
        for entry in entries.into_iter().skip(start) {
            self.sink.emit(UiUpdate::ServerLog(entry));
        }
        if let Ok(mut guard) = self.cursor.lock() {
            *guard = next;
        }
        Ok(fresh)
    }

    /// Forgets the cursor, e.g. after the user cleared the log.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.cursor.lock() {
            *guard = None;
        }
        self.sink.emit(UiUpdate::ServerLogCleared);
    }

    pub fn start(self: &Arc<Self>) {
        let poller = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let _ = poller.poll_once().await;
            }
        });

        if let Ok(mut guard) = self.task.lock() {
            if let Some(existing) = guard.take() {
                existing.abort();
            }
            *guard = Some(handle);
        }
    }

    pub fn stop(&self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
