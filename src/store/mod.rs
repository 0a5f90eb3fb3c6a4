//! Durable record of subscribers and of the delivery log.

mod memory;
mod postgres;

pub use memory::InMemorySubscriberStore;
pub use postgres::PostgresSubscriberStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{
    DeliveryAttempt, EmailFrequency, NewDeliveryAttempt, NewSubscriber, Subscriber,
};

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Returns the new subscriber id, or `None` when the email is already registered.
    async fn add_subscriber(&self, subscriber: &NewSubscriber) -> Result<Option<Uuid>, StoreError>;

    /// Active subscribers on `frequency` that are due a delivery at `now`.
    async fn eligible_subscribers(
        &self,
        frequency: EmailFrequency,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscriber>, StoreError>;

    async fn update_last_sent(&self, subscriber_id: Uuid, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// Appends one record to the delivery log and returns its id.
    async fn log_delivery_attempt(&self, attempt: &NewDeliveryAttempt) -> Result<Uuid, StoreError>;

    /// Every log record whose timestamp falls on `date` (UTC).
    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DeliveryAttempt>, StoreError>;
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Failed to execute a query against the subscriber store.")]
    Query(#[from] sqlx::Error),
    #[error("A stored record is invalid: {0}")]
    InvalidRecord(String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let StoreError::Query(err) = self {
            write!(f, "\nCaused by:\n\t({})", err)?;
        }
        Ok(())
    }
}

/// Half-open UTC range `[date 00:00, date + 1 00:00)`.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));

    (start, start + chrono::Duration::days(1))
}
