use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
};

use crate::traits::{Notifier, NotifyError, OperatorAlert};

/// A [`Notifier`] that remembers everything it was asked to send. Buyer notifications can be switched off to
/// simulate a closed session.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(String, String)>>>,
    alerts: Arc<Mutex<Vec<OperatorAlert>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn close_buyer_channel(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// `(session_id, message)` pairs, oldest first.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn messages_for(&self, session_id: &str) -> Vec<String> {
        self.messages().into_iter().filter(|(s, _)| s == session_id).map(|(_, m)| m).collect()
    }

    pub fn alerts(&self) -> Vec<OperatorAlert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, session_id: &str, message: &str) -> Result<(), NotifyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NotifyError::ChannelClosed(format!("Session {session_id} is closed")));
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((session_id.to_string(), message.to_string()));
        }
        Ok(())
    }

    async fn alert_operator(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert.clone());
        }
        Ok(())
    }
}
