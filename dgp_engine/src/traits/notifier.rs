use thiserror::Error;

use crate::traits::data_objects::OperatorAlert;

/// Outbound messages to buyers and the operator.
///
/// A notification failure never undoes the work that caused it. Callers log it and escalate.
#[allow(async_fn_in_trait)]
pub trait Notifier: Clone {
    async fn notify(&self, session_id: &str, message: &str) -> Result<(), NotifyError>;

    async fn alert_operator(&self, alert: &OperatorAlert) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("The notification channel is closed. {0}")]
    ChannelClosed(String),
    #[error("Could not deliver the notification. {0}")]
    DeliveryFailed(String),
    #[error("Notification timed out")]
    TimedOut,
}
