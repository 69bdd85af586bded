// src/view/mod.rs
// View-model layer - components describe UI changes as events

pub mod activity;
pub mod controls;
pub mod notify;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog, Reporter};
pub use controls::{Control, ControlBoard, ControlGuard};
pub use notify::{Notification, NOTIFICATION_TTL};

use crate::gateway::{AudioRole, LogEntry, ProcessingStatus};
use crate::segments::CellKey;
use crate::waveform::CanvasState;
use uuid::Uuid;

/// Transient cell colouring after a save attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Highlight {
    Success,
    Error(String),
}

/// One UI change. Sinks apply these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Progress {
        percent: u8,
        step: String,
    },
    Status(ProcessingStatus),
    /// Table was rebuilt; consumers re-read `SegmentTable::render`.
    TableRebuilt {
        revision: u64,
        rows: usize,
    },
    CellText {
        cell: CellKey,
        text: String,
    },
    CellHighlight {
        cell: CellKey,
        highlight: Highlight,
    },
    CellHighlightCleared {
        cell: CellKey,
    },
    Waveform {
        role: AudioRole,
        state: CanvasState,
    },
    PlaybackOverlay {
        role: AudioRole,
        cursor_x: u32,
        label: String,
    },
    PlaybackOverlayCleared {
        role: AudioRole,
    },
    Control {
        control: Control,
        enabled: bool,
    },
    VideoPreview {
        bytes: usize,
    },
    ServerLog(LogEntry),
    ServerLogCleared,
    Notify(Notification),
    Dismiss(Uuid),
}

pub trait UiSink: Send + Sync {
    fn emit(&self, update: UiUpdate);
}

/// Headless sink that only traces what a UI would show.
#[derive(Debug, Default)]
pub struct TracingSink;

impl UiSink for TracingSink {
    fn emit(&self, update: UiUpdate) {
        match update {
            UiUpdate::Progress { percent, step } => {
                tracing::info!("Progress {}% - {}", percent, step)
            }
            UiUpdate::Notify(n) => tracing::info!("[{}] {}", n.level, n.message),
            UiUpdate::ServerLog(entry) => {
                tracing::debug!("server {} {}: {}", entry.timestamp, entry.level, entry.message)
            }
            other => tracing::trace!("ui update: {:?}", other),
        }
    }
}

/// Fans one update out to several sinks.
#[derive(Default)]
pub struct EventHub {
    sinks: Vec<std::sync::Arc<dyn UiSink>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: std::sync::Arc<dyn UiSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl UiSink for EventHub {
    fn emit(&self, update: UiUpdate) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(update.clone());
            }
            last.emit(update);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_hub_fans_out_in_order() {
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        let hub = EventHub::new().with(a.clone()).with(b.clone());

        hub.emit(UiUpdate::VideoPreview { bytes: 3 });
        hub.emit(UiUpdate::ServerLogCleared);

        assert_eq!(a.updates(), b.updates());
        assert_eq!(a.updates().len(), 2);
    }
}
