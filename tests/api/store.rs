//! Needs a running Postgres, see `config/base.yaml`. Run with `cargo test -- --ignored`.
use chrono::{Duration, TimeZone, Utc};
use claims::{assert_none, assert_some};
use uuid::Uuid;

use mindfuel::config::get_configuration;
use mindfuel::domain::{
    DeliveryStatus, EmailFrequency, NewDeliveryAttempt, NewSubscriber, SubscriberEmail,
    SubscriberName, SubscriptionStatus,
};
use mindfuel::store::{PostgresSubscriberStore, SubscriberStore};

use crate::helpers::configure_db;

async fn postgres_store() -> PostgresSubscriberStore {
    let mut config = get_configuration().expect("Missing configuration file.");
    let db_pool = configure_db(&mut config.database).await;

    PostgresSubscriberStore::new(db_pool)
}

fn new_subscriber(email: &str, frequency: EmailFrequency) -> NewSubscriber {
    NewSubscriber {
        email: SubscriberEmail::parse(email.to_string()).unwrap(),
        name: Some(SubscriberName::parse(String::from("Ada")).unwrap()),
        status: SubscriptionStatus::Active,
        frequency,
    }
}

#[tokio::test]
#[ignore]
async fn postgres_store_skips_duplicate_emails() {
    let store = postgres_store().await;

    assert_some!(store
        .add_subscriber(&new_subscriber("ada@mindfuel.io", EmailFrequency::Daily))
        .await
        .unwrap());
    assert_none!(store
        .add_subscriber(&new_subscriber("ada@mindfuel.io", EmailFrequency::Weekly))
        .await
        .unwrap());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscribers")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore]
async fn postgres_store_selects_due_subscribers_of_a_cadence() {
    let store = postgres_store().await;
    let now = Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap();
    let daily = store
        .add_subscriber(&new_subscriber("ada@mindfuel.io", EmailFrequency::Daily))
        .await
        .unwrap()
        .unwrap();
    let weekly = store
        .add_subscriber(&new_subscriber("grace@mindfuel.io", EmailFrequency::Weekly))
        .await
        .unwrap()
        .unwrap();
    let mut paused = new_subscriber("paused@mindfuel.io", EmailFrequency::Daily);
    paused.status = SubscriptionStatus::Inactive;
    store.add_subscriber(&paused).await.unwrap();

    store
        .update_last_sent(daily, now - Duration::days(1))
        .await
        .unwrap();
    store
        .update_last_sent(weekly, now - Duration::days(6))
        .await
        .unwrap();

    let due_daily = store
        .eligible_subscribers(EmailFrequency::Daily, now)
        .await
        .unwrap();
    let due_weekly = store
        .eligible_subscribers(EmailFrequency::Weekly, now)
        .await
        .unwrap();

    assert_eq!(due_daily.len(), 1);
    assert_eq!(due_daily[0].id, daily);
    assert_eq!(due_daily[0].name.as_ref().map(|name| name.as_ref()), Some("Ada"));
    assert!(due_weekly.is_empty());
}

#[tokio::test]
#[ignore]
async fn postgres_store_returns_the_logs_of_one_day() {
    let store = postgres_store().await;
    let subscriber_id = store
        .add_subscriber(&new_subscriber("ada@mindfuel.io", EmailFrequency::Daily))
        .await
        .unwrap()
        .unwrap();
    let midnight = Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap();

    for (attempted_at, status) in [
        (midnight - Duration::seconds(1), DeliveryStatus::Sent),
        (midnight, DeliveryStatus::Sent),
        (midnight + Duration::hours(12), DeliveryStatus::Failed),
        (midnight + Duration::days(1), DeliveryStatus::Sent),
    ] {
        store
            .log_delivery_attempt(&NewDeliveryAttempt {
                subscriber_id,
                email: SubscriberEmail::parse(String::from("ada@mindfuel.io")).unwrap(),
                status,
                error_message: (!status.is_sent()).then(|| String::from("mailbox full")),
                attempt_count: 3,
                attempted_at,
            })
            .await
            .unwrap();
    }

    let logs = store.logs_for_date(midnight.date_naive()).await.unwrap();

    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].subscriber_id, Some(subscriber_id));
    assert_eq!(logs[1].status, DeliveryStatus::Failed);
    assert_eq!(logs[1].error_message.as_deref(), Some("mailbox full"));
    assert!(logs.iter().all(|log| log.id != Uuid::nil()));
}
