//! Delivers buyer messages and operator alerts.
//!
//! The conversation front end exposes a webhook. Every buyer message and every operator alert is POSTed to it as JSON,
//! addressed by session id. Without a webhook, messages are written to the log only.
use dgp_engine::{traits::OperatorAlert, Notifier, NotifyError};
use log::*;
use serde::{Deserialize, Serialize};

use crate::config::NotifierConfig;

/// The JSON body POSTed to the notification webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub session_id: String,
    pub message: String,
    /// Present on operator alerts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<OperatorAlert>,
}

#[derive(Debug, Clone)]
pub enum ServerNotifier {
    Webhook { client: reqwest::Client, url: String, operator_session: String },
    LogOnly { operator_session: String },
}

impl ServerNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        let operator_session = config.operator_session.clone();
        match &config.webhook_url {
            Some(url) => Self::Webhook { client: reqwest::Client::new(), url: url.clone(), operator_session },
            None => Self::LogOnly { operator_session },
        }
    }

    pub fn operator_session(&self) -> &str {
        match self {
            Self::Webhook { operator_session, .. } | Self::LogOnly { operator_session } => operator_session,
        }
    }

    async fn post(&self, body: &OutboundMessage) -> Result<(), NotifyError> {
        match self {
            Self::Webhook { client, url, .. } => {
                let response = client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| NotifyError::DeliveryFailed(format!("Could not reach the notification hook. {e}")))?;
                let status = response.status();
                if status.is_success() {
                    trace!("📬️ Message delivered to session {}", body.session_id);
                    Ok(())
                } else if status == reqwest::StatusCode::GONE || status == reqwest::StatusCode::NOT_FOUND {
                    Err(NotifyError::ChannelClosed(format!("Session {} is no longer reachable", body.session_id)))
                } else {
                    let text = response.text().await.unwrap_or_default();
                    Err(NotifyError::DeliveryFailed(format!("The notification hook returned {status}. {text}")))
                }
            },
            Self::LogOnly { .. } => {
                info!("📬️ [{}] {}", body.session_id, body.message);
                Ok(())
            },
        }
    }
}

impl Notifier for ServerNotifier {
    async fn notify(&self, session_id: &str, message: &str) -> Result<(), NotifyError> {
        let body = OutboundMessage { session_id: session_id.to_string(), message: message.to_string(), alert: None };
        self.post(&body).await
    }

    async fn alert_operator(&self, alert: &OperatorAlert) -> Result<(), NotifyError> {
        let mut message = alert.to_string();
        if let Some(payload) = &alert.payload {
            message = format!("{message}\n\n{payload}");
        }
        let body =
            OutboundMessage { session_id: self.operator_session().to_string(), message, alert: Some(alert.clone()) };
        self.post(&body).await
    }
}
