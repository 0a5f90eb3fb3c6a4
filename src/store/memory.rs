use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{day_bounds, StoreError, SubscriberStore};
use crate::domain::{
    DeliveryAttempt, EmailFrequency, NewDeliveryAttempt, NewSubscriber, Subscriber,
};

#[derive(Default)]
struct Tables {
    subscribers: Vec<Subscriber>,
    delivery_attempts: Vec<DeliveryAttempt>,
}

/// In-memory [`SubscriberStore`] for development and testing.
///
/// Subscribers are returned in insertion order. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemorySubscriberStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribers(&self) -> Vec<Subscriber> {
        self.tables.lock().await.subscribers.clone()
    }

    pub async fn subscriber_by_email(&self, email: &str) -> Option<Subscriber> {
        self.tables
            .lock()
            .await
            .subscribers
            .iter()
            .find(|subscriber| subscriber.email.as_ref() == email)
            .cloned()
    }

    pub async fn delivery_attempts(&self) -> Vec<DeliveryAttempt> {
        self.tables.lock().await.delivery_attempts.clone()
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn add_subscriber(&self, subscriber: &NewSubscriber) -> Result<Option<Uuid>, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables
            .subscribers
            .iter()
            .any(|existing| existing.email == subscriber.email)
        {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        tables.subscribers.push(Subscriber {
            id,
            email: subscriber.email.clone(),
            name: subscriber.name.clone(),
            status: subscriber.status,
            frequency: subscriber.frequency,
            last_delivered_at: None,
        });

        Ok(Some(id))
    }

    async fn eligible_subscribers(
        &self,
        frequency: EmailFrequency,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.is_eligible(frequency, now))
            .cloned()
            .collect())
    }

    async fn update_last_sent(
        &self,
        subscriber_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if let Some(subscriber) = tables
            .subscribers
            .iter_mut()
            .find(|subscriber| subscriber.id == subscriber_id)
        {
            subscriber.last_delivered_at = Some(at);
        }

        Ok(())
    }

    async fn log_delivery_attempt(&self, attempt: &NewDeliveryAttempt) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();

        self.tables.lock().await.delivery_attempts.push(DeliveryAttempt {
            id,
            subscriber_id: Some(attempt.subscriber_id),
            email: attempt.email.as_ref().to_string(),
            status: attempt.status,
            error_message: attempt.error_message.clone(),
            attempt_count: attempt.attempt_count,
            attempted_at: attempt.attempted_at,
        });

        Ok(id)
    }

    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DeliveryAttempt>, StoreError> {
        let (start, end) = day_bounds(date);
        let tables = self.tables.lock().await;

        Ok(tables
            .delivery_attempts
            .iter()
            .filter(|attempt| attempt.attempted_at >= start && attempt.attempted_at < end)
            .cloned()
            .collect())
    }
}
