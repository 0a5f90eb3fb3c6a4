use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }

    pub fn parse(status: String) -> Result<DeliveryStatus, String> {
        match status.as_str() {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("{} is not a valid delivery status", status)),
        }
    }
}

impl AsRef<str> for DeliveryStatus {
    fn as_ref(&self) -> &str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Terminal result of one subscriber's retry sequence, as recorded in the log.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub id: Uuid,
    /// `None` once the subscriber row has been deleted.
    pub subscriber_id: Option<Uuid>,
    pub email: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub attempted_at: DateTime<Utc>,
}

pub struct NewDeliveryAttempt {
    pub subscriber_id: Uuid,
    pub email: SubscriberEmail,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub attempted_at: DateTime<Utc>,
}
