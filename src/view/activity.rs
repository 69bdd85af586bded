// Client-side activity log and the reporter that feeds it

use super::notify::{emit_after, Notification, NOTIFICATION_TTL};
use super::{UiSink, UiUpdate};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

pub const ACTIVITY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Success => "SUCCESS",
            ActivityLevel::Warning => "WARNING",
            ActivityLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub at: DateTime<Local>,
    pub level: ActivityLevel,
    pub message: String,
}

/// Bounded history, oldest entries fall off first.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(ACTIVITY_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, level: ActivityLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(ActivityEntry {
                at: Local::now(),
                level,
                message: message.to_string(),
            });
        }
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Surfaces an outcome three ways: tracing, activity log and a toast.
#[derive(Clone)]
pub struct Reporter {
    log: Arc<ActivityLog>,
    sink: Arc<dyn UiSink>,
}

impl Reporter {
    pub fn new(log: Arc<ActivityLog>, sink: Arc<dyn UiSink>) -> Self {
        Self { log, sink }
    }

    pub fn sink(&self) -> Arc<dyn UiSink> {
        self.sink.clone()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.log
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", message);
        self.surface(ActivityLevel::Info, message);
    }

    pub fn success(&self, message: &str) {
        tracing::info!("{}", message);
        self.surface(ActivityLevel::Success, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.surface(ActivityLevel::Warning, message);
    }

    pub fn error(&self, context: &str, err: &dyn fmt::Display) {
        let message = format!("{}: {}", context, err);
        tracing::error!("{}", message);
        self.surface(ActivityLevel::Error, &message);
    }

    fn surface(&self, level: ActivityLevel, message: &str) {
        self.log.push(level, message);
        let note = Notification::new(level, message);
        let id = note.id;
        self.sink.emit(UiUpdate::Notify(note));
        emit_after(self.sink.clone(), NOTIFICATION_TTL, UiUpdate::Dismiss(id));
    }
}
