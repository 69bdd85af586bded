use super::{UiSink, UiUpdate};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Upload,
    StartProcessing,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Upload => f.write_str("upload"),
            Control::StartProcessing => f.write_str("start"),
        }
    }
}

/// Enabled state of the action buttons. Only real changes are emitted.
pub struct ControlBoard {
    states: Mutex<HashMap<Control, bool>>,
    sink: Arc<dyn UiSink>,
}

impl ControlBoard {
    pub fn new(sink: Arc<dyn UiSink>) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(HashMap::new()),
            sink,
        })
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        self.states
            .lock()
            .map(|states| states.get(&control).copied().unwrap_or(true))
            .unwrap_or(true)
    }

    /// Returns true when the state actually changed.
    pub fn set(&self, control: Control, enabled: bool) -> bool {
        let changed = match self.states.lock() {
            Ok(mut states) => {
                let previous = states.insert(control, enabled).unwrap_or(true);
                previous != enabled
            }
            Err(_) => false,
        };
        if changed {
            tracing::debug!("Control {} enabled={}", control, enabled);
            self.sink.emit(UiUpdate::Control { control, enabled });
        }
        changed
    }

    /// Disables `control` for the duration of an operation. None when it
    /// is already disabled (operation in flight).
    pub fn acquire(self: &Arc<Self>, control: Control) -> Option<ControlGuard> {
        if !self.set(control, false) {
            return None;
        }
        Some(ControlGuard {
            board: self.clone(),
            control,
            restore: true,
        })
    }
}

/// Re-enables its control on drop unless handed off.
pub struct ControlGuard {
    board: Arc<ControlBoard>,
    control: Control,
    restore: bool,
}

impl ControlGuard {
    /// Leaves the control disabled; whoever takes over re-enables it.
    pub fn keep_disabled(mut self) {
        self.restore = false;
    }
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        if self.restore {
            self.board.set(self.control, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::testing::RecordingSink;

    #[test]
    fn test_guard_restores_on_drop() {
        let sink = Arc::new(RecordingSink::default());
        let board = ControlBoard::new(sink.clone());

        {
            let _guard = board.acquire(Control::Upload).unwrap();
            assert!(!board.is_enabled(Control::Upload));
            assert!(board.acquire(Control::Upload).is_none());
        }
        assert!(board.is_enabled(Control::Upload));
        assert_eq!(
            sink.updates(),
            vec![
                UiUpdate::Control {
                    control: Control::Upload,
                    enabled: false
                },
                UiUpdate::Control {
                    control: Control::Upload,
                    enabled: true
                },
            ]
        );
    }

    #[test]
    fn test_handed_off_guard_keeps_control_disabled() {
        let sink = Arc::new(RecordingSink::default());
        let board = ControlBoard::new(sink.clone());

        board.acquire(Control::StartProcessing).unwrap().keep_disabled();
        assert!(!board.is_enabled(Control::StartProcessing));

        assert!(board.set(Control::StartProcessing, true));
        assert!(!board.set(Control::StartProcessing, true));
        assert_eq!(sink.updates().len(), 2);
    }
}
