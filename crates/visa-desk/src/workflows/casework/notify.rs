use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Review events the applicant is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Approval,
    Rejection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub message: String,
}

/// Delivery receipt handed back by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAck {
    pub id: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification to '{recipient}' could not be delivered: {reason}")]
    Delivery { recipient: String, reason: String },
}

pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        recipient: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<NotificationAck, NotifyError>;
}

/// Notifier that keeps every message in memory and logs it.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn notify(
        &self,
        recipient: &str,
        kind: NotificationKind,
        message: &str,
    ) -> Result<NotificationAck, NotifyError> {
        let mut sent = self.sent.lock().map_err(|_| NotifyError::Delivery {
            recipient: recipient.to_string(),
            reason: "outbox lock poisoned".to_string(),
        })?;
        sent.push(Notification {
            recipient: recipient.to_string(),
            kind,
            message: message.to_string(),
        });
        let ack = NotificationAck {
            id: format!("notice-{:06}", sent.len()),
            kind,
        };
        info!(recipient, ?kind, ack = %ack.id, "notification queued");
        Ok(ack)
    }
}
