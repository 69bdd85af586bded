use super::{ActivityLevel, UiSink, UiUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// How long a toast stays on screen
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub level: ActivityLevel,
    pub message: String,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(level: ActivityLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            expires_at: Instant::now() + NOTIFICATION_TTL,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Emits `update` once `delay` has passed. Dropped when no runtime is running.
pub(crate) fn emit_after(sink: Arc<dyn UiSink>, delay: Duration, update: UiUpdate) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                sink.emit(update);
            });
        }
        Err(_) => tracing::debug!("No runtime, dropping delayed update {:?}", update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::testing::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn test_notification_expires_after_ttl() {
        let note = Notification::new(ActivityLevel::Error, "upload failed");
        assert!(!note.is_expired(Instant::now()));
        tokio::time::advance(NOTIFICATION_TTL).await;
        assert!(note.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_after_waits_for_delay() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::new_v4();
        emit_after(sink.clone(), NOTIFICATION_TTL, UiUpdate::Dismiss(id));

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(sink.updates().is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.updates(), vec![UiUpdate::Dismiss(id)]);
    }
}
