pub mod telegram;

use crate::detection::AnomalyEvent;
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Delivers anomaly events to a human
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AnomalyEvent) -> Result<(), NotifyError>;
}

/// Notifier that only writes the event to the log
///
/// Used when no chat integration is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &AnomalyEvent) -> Result<(), NotifyError> {
        warn!(station = event.station(), kind = ?event.kind(), "{}", event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let event = AnomalyEvent::MaxExceeded {
            station: "Lawn".to_string(),
            measurement: 9.0,
            limit: 6.0,
        };

        assert!(LogNotifier.notify(&event).await.is_ok());

        let boxed: Box<dyn Notifier> = Box::new(LogNotifier);
        assert!(boxed.notify(&event).await.is_ok());
    }
}
