use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::email_frequency::EmailFrequency;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscriber_status::SubscriptionStatus;

#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub name: Option<SubscriberName>,
    pub status: SubscriptionStatus,
    pub frequency: EmailFrequency,
    pub last_delivered_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Whether this subscriber is due a quote on the `frequency` cadence at `now`.
    ///
    /// Subscribers that never received anything are always due; otherwise at
    /// least one full interval must have elapsed (the boundary counts as due).
    pub fn is_eligible(&self, frequency: EmailFrequency, now: DateTime<Utc>) -> bool {
        if !self.status.is_active() || self.frequency != frequency {
            return false;
        }

        match self.last_delivered_at {
            None => true,
            Some(last_delivered_at) => now - last_delivered_at >= frequency.interval(),
        }
    }

    pub fn greeting(&self) -> String {
        match &self.name {
            Some(name) => format!("Hi {},", name.as_ref()),
            None => String::from("Hello,"),
        }
    }
}
