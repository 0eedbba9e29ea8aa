//! Push-notification contract.
//!
//! Delivery is best-effort and fire-and-forget: the hub logs failures and
//! moves on, it never fails an operation because a notification did not go
//! out.

use crate::entities::UserId;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Notification errors. Callers ignore these beyond logging.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification send failed: {0}")]
    Send(String),
}

/// Best-effort push notification sender.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        target_token: &str,
        title: &str,
        body: &str,
        user_id: &UserId,
    ) -> Result<(), NotifyError>;
}

/// Reference implementation that only logs. Useful for development and as
/// the default when no push backend is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        _target_token: &str,
        title: &str,
        _body: &str,
        user_id: &UserId,
    ) -> Result<(), NotifyError> {
        debug!(user = %user_id, title = %title, "Notification (log only)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier
            .send("token", "Live Started", "body", &"u1".to_string())
            .await
            .is_ok());
    }
}
