use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{day_bounds, StoreError, SubscriberStore};
use crate::domain::{
    DeliveryAttempt, DeliveryStatus, EmailFrequency, NewDeliveryAttempt, NewSubscriber,
    Subscriber, SubscriberEmail, SubscriberName, SubscriptionStatus,
};

pub struct PostgresSubscriberStore {
    db_pool: PgPool,
}

impl PostgresSubscriberStore {
    pub fn new(db_pool: PgPool) -> PostgresSubscriberStore {
        PostgresSubscriberStore { db_pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, StoreError> {
    Ok(Subscriber {
        id: row.try_get("id")?,
        email: SubscriberEmail::parse(row.try_get("email")?).map_err(StoreError::InvalidRecord)?,
        name: SubscriberName::parse_optional(row.try_get("name")?)
            .map_err(StoreError::InvalidRecord)?,
        status: SubscriptionStatus::parse(row.try_get("subscription_status")?)
            .map_err(StoreError::InvalidRecord)?,
        frequency: EmailFrequency::parse(row.try_get("email_frequency")?)
            .map_err(StoreError::InvalidRecord)?,
        last_delivered_at: row.try_get("last_delivered_at")?,
    })
}

fn delivery_attempt_from_row(row: &PgRow) -> Result<DeliveryAttempt, StoreError> {
    let attempt_count: i32 = row.try_get("attempt_count")?;

    Ok(DeliveryAttempt {
        id: row.try_get("id")?,
        subscriber_id: row.try_get("subscriber_id")?,
        email: row.try_get("email")?,
        status: DeliveryStatus::parse(row.try_get("status")?).map_err(StoreError::InvalidRecord)?,
        error_message: row.try_get("error_message")?,
        attempt_count: u32::try_from(attempt_count).map_err(|_| {
            StoreError::InvalidRecord(format!("{} is not a valid attempt count", attempt_count))
        })?,
        attempted_at: row.try_get("attempted_at")?,
    })
}

#[async_trait]
impl SubscriberStore for PostgresSubscriberStore {
    #[tracing::instrument(
        name = "Insert a new subscriber into the database",
        skip(self, subscriber),
        fields(subscriber_email = %subscriber.email)
    )]
    async fn add_subscriber(&self, subscriber: &NewSubscriber) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO subscribers (id, email, name, subscription_status, email_frequency, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscriber.email.as_ref())
        .bind(subscriber.name.as_ref().map(|name| name.as_ref().to_string()))
        .bind(subscriber.status.as_ref())
        .bind(subscriber.frequency.as_ref())
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        match row {
            Some(row) => {
                let id: Uuid = row.try_get("id")?;
                tracing::info!("Added subscriber with id {}", id);
                Ok(Some(id))
            }
            None => {
                tracing::info!("Subscriber already exists. No insertion made.");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(name = "Fetch eligible subscribers from the database", skip(self))]
    async fn eligible_subscribers(
        &self,
        frequency: EmailFrequency,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let due_before = now - frequency.interval();

        let rows = sqlx::query(
            r#"
            SELECT id, email, name, subscription_status, email_frequency, last_delivered_at
            FROM subscribers
            WHERE subscription_status = 'active'
            AND email_frequency = $1
            AND (last_delivered_at IS NULL OR last_delivered_at <= $2)
            ORDER BY created_at
            "#,
        )
        .bind(frequency.as_ref())
        .bind(due_before)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        let subscribers = rows
            .iter()
            .map(subscriber_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Fetched {} eligible subscribers for frequency '{}'",
            subscribers.len(),
            frequency
        );

        Ok(subscribers)
    }

    #[tracing::instrument(name = "Update the last delivery time of a subscriber", skip(self))]
    async fn update_last_sent(
        &self,
        subscriber_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE subscribers SET last_delivered_at = $1 WHERE id = $2"#)
            .bind(at)
            .bind(subscriber_id)
            .execute(&self.db_pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute query: {:?}", err);
                err
            })?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Record a delivery attempt",
        skip(self, attempt),
        fields(
            subscriber_email = %attempt.email,
            status = %attempt.status.as_ref(),
            attempt_count = attempt.attempt_count
        )
    )]
    async fn log_delivery_attempt(&self, attempt: &NewDeliveryAttempt) -> Result<Uuid, StoreError> {
        let attempt_count = i32::try_from(attempt.attempt_count).map_err(|_| {
            StoreError::InvalidRecord(format!("{} attempts cannot be stored", attempt.attempt_count))
        })?;
        let log_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO delivery_attempts
                (id, subscriber_id, email, status, error_message, attempt_count, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log_id)
        .bind(attempt.subscriber_id)
        .bind(attempt.email.as_ref())
        .bind(attempt.status.as_ref())
        .bind(attempt.error_message.as_deref())
        .bind(attempt_count)
        .bind(attempt.attempted_at)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        Ok(log_id)
    }

    #[tracing::instrument(name = "Fetch the delivery log of a day", skip(self))]
    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DeliveryAttempt>, StoreError> {
        let (start, end) = day_bounds(date);

        let rows = sqlx::query(
            r#"
            SELECT id, subscriber_id, email, status, error_message, attempt_count, attempted_at
            FROM delivery_attempts
            WHERE attempted_at >= $1 AND attempted_at < $2
            ORDER BY attempted_at
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        let attempts = rows
            .iter()
            .map(delivery_attempt_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Retrieved {} log(s) for date {}", attempts.len(), date);

        Ok(attempts)
    }
}
