use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use claims::{assert_err, assert_ok};
use std::sync::Arc;
use std::time;
use wiremock::matchers::any;
use wiremock::{Mock, ResponseTemplate};

use mindfuel::clock::{Clock, SystemClock};
use mindfuel::config::get_configuration;
use mindfuel::dispatch::{DispatchCounts, DispatchOutcome};
use mindfuel::domain::{
    DeliveryAttempt, DeliveryStatus, EmailFrequency, NewDeliveryAttempt, NewSubscriber,
    SeedSubscriber, Subscriber, SubscriberEmail, SubscriptionStatus,
};
use mindfuel::email_client::SendEmailError;
use mindfuel::startup::{Application, ApplicationError};
use mindfuel::store::{InMemorySubscriberStore, StoreError, SubscriberStore};
use uuid::Uuid;

use crate::helpers::{RecordingTransport, TestApp};

fn delivered(sent: usize) -> DispatchOutcome {
    DispatchOutcome::Delivered(DispatchCounts { sent, failed: 0 })
}

#[tokio::test]
async fn seeded_subscribers_get_their_quote_and_operator_gets_a_summary() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;

    let report = assert_ok!(test_app.app.run_quote_dispatch().await);

    assert_eq!(report.daily.unwrap(), delivered(1));
    assert_eq!(report.weekly.unwrap(), delivered(1));
    assert!(report.summary_sent);

    let sent = test_app.transport.delivered();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].recipient, "ada@mindfuel.io");
    assert_eq!(sent[0].subject, "Your Daily MindFuel Quote");
    assert!(sent[0].body.starts_with("Hi Ada,"));
    assert!(sent[0].body.contains("Quote number"));
    assert_eq!(sent[1].recipient, "grace@mindfuel.io");
    assert_eq!(sent[1].subject, "Your Weekly MindFuel Quote");
    assert!(sent[1].body.starts_with("Hello,"));
    assert_eq!(sent[2].recipient, test_app.operator_email());
    assert_eq!(sent[2].subject, "MindFuel Daily Summary Report - 2026-03-02");
    assert!(sent[2].body.contains("Success Rate           : 100.00%"));
}

#[tokio::test]
async fn every_delivery_is_logged_and_marks_the_subscriber() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;

    test_app.app.run_quote_dispatch().await.unwrap();

    let attempts = test_app.store.delivery_attempts().await;
    assert_eq!(attempts.len(), 2);
    assert!(attempts
        .iter()
        .all(|attempt| attempt.status == DeliveryStatus::Sent && attempt.attempt_count == 1));

    for subscriber in test_app.store.subscribers().await {
        assert_eq!(subscriber.last_delivered_at, Some(test_app.clock.now()));
    }
}

#[tokio::test]
async fn quote_api_failure_aborts_the_run_before_sending() {
    let test_app = TestApp::spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&test_app.quote_server)
        .await;

    let error = assert_err!(test_app.app.run_quote_dispatch().await);

    assert!(matches!(error, ApplicationError::Quotes(_)));
    assert!(test_app.transport.attempts().is_empty());
    assert!(test_app.store.delivery_attempts().await.is_empty());
}

#[tokio::test]
async fn a_second_run_on_the_same_day_only_sends_the_summary() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;

    test_app.app.run_quote_dispatch().await.unwrap();
    test_app.clock.advance(Duration::hours(3));
    let report = test_app.app.run_quote_dispatch().await.unwrap();

    assert_eq!(report.daily.unwrap(), DispatchOutcome::NoEligibleSubscribers);
    assert_eq!(report.weekly.unwrap(), DispatchOutcome::NoEligibleSubscribers);
    assert!(report.summary_sent);
    assert_eq!(test_app.transport.delivered_to("ada@mindfuel.io").len(), 1);
    assert_eq!(
        test_app
            .transport
            .delivered_to(&test_app.operator_email())
            .len(),
        2
    );
    assert_eq!(test_app.store.subscribers().await.len(), 2);
}

#[tokio::test]
async fn cadences_follow_their_own_interval() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;

    test_app.app.run_quote_dispatch().await.unwrap();
    test_app.clock.advance(Duration::days(1));
    let next_day = test_app.app.run_quote_dispatch().await.unwrap();
    test_app.clock.advance(Duration::days(6));
    let next_week = test_app.app.run_quote_dispatch().await.unwrap();

    assert_eq!(next_day.daily.unwrap(), delivered(1));
    assert_eq!(next_day.weekly.unwrap(), DispatchOutcome::NoEligibleSubscribers);
    assert_eq!(next_week.daily.unwrap(), delivered(1));
    assert_eq!(next_week.weekly.unwrap(), delivered(1));
    assert_eq!(test_app.transport.delivered_to("ada@mindfuel.io").len(), 3);
    assert_eq!(test_app.transport.delivered_to("grace@mindfuel.io").len(), 2);
}

#[tokio::test]
async fn transient_failures_are_retried_with_backoff_then_reported() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;
    test_app.transport.fail_for(
        "ada@mindfuel.io",
        SendEmailError::Timeout(String::from("connection timed out")),
    );

    let report = test_app.app.run_quote_dispatch().await.unwrap();

    assert_eq!(
        report.daily.unwrap(),
        DispatchOutcome::AllFailed(DispatchCounts { sent: 0, failed: 1 })
    );
    assert_eq!(report.weekly.unwrap(), delivered(1));
    assert_eq!(
        test_app.clock.sleeps(),
        vec![time::Duration::from_secs(2), time::Duration::from_secs(4)]
    );

    let ada = test_app
        .store
        .delivery_attempts()
        .await
        .into_iter()
        .find(|attempt| attempt.email == "ada@mindfuel.io")
        .unwrap();
    assert_eq!(ada.status, DeliveryStatus::Failed);
    assert_eq!(ada.attempt_count, 3);
    assert!(ada.error_message.unwrap().contains("connection timed out"));

    let summary = test_app
        .transport
        .delivered_to(&test_app.operator_email())
        .pop()
        .unwrap();
    assert!(summary.body.contains("Failed Deliveries      : 1"));
    assert!(summary.body.contains("Success Rate           : 50.00%"));
    assert!(summary.body.contains("Action Recommended"));
}

#[tokio::test]
async fn rejected_recipients_are_not_retried() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;
    test_app.transport.fail_for(
        "grace@mindfuel.io",
        SendEmailError::RecipientRejected(String::from("grace@mindfuel.io")),
    );

    let report = test_app.app.run_quote_dispatch().await.unwrap();

    assert_eq!(
        report.weekly.unwrap(),
        DispatchOutcome::AllFailed(DispatchCounts { sent: 0, failed: 1 })
    );
    assert!(test_app.clock.sleeps().is_empty());
    let grace = test_app
        .store
        .subscriber_by_email("grace@mindfuel.io")
        .await
        .unwrap();
    assert_eq!(grace.last_delivered_at, None);
}

#[tokio::test]
async fn inactive_subscribers_are_never_mailed() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(5).await;
    test_app
        .store
        .add_subscriber(&NewSubscriber {
            email: SubscriberEmail::parse(String::from("paused@mindfuel.io")).unwrap(),
            name: None,
            status: SubscriptionStatus::Inactive,
            frequency: EmailFrequency::Daily,
        })
        .await
        .unwrap();

    let report = test_app.app.run_quote_dispatch().await.unwrap();

    assert_eq!(report.daily.unwrap(), delivered(1));
    assert!(test_app
        .transport
        .attempts()
        .iter()
        .all(|email| email.recipient != "paused@mindfuel.io"));
}

#[test]
fn invalid_seed_subscribers_are_rejected_at_startup() {
    let mut config = get_configuration().expect("Missing configuration file.");
    config.subscribers.push(SeedSubscriber {
        email: String::from("not-an-email"),
        name: None,
        subscription_status: SubscriptionStatus::Active,
        email_frequency: EmailFrequency::Daily,
    });

    let result = Application::with_components(
        &config,
        Arc::new(InMemorySubscriberStore::new()),
        Arc::new(RecordingTransport::default()),
        Arc::new(SystemClock),
    );

    assert!(matches!(
        result,
        Err(ApplicationError::InvalidConfiguration(_))
    ));
}

/// Cannot take new subscribers, serves everything else from memory.
struct ClosedRegistrationStore {
    inner: InMemorySubscriberStore,
}

#[async_trait]
impl SubscriberStore for ClosedRegistrationStore {
    async fn add_subscriber(
        &self,
        _subscriber: &NewSubscriber,
    ) -> Result<Option<Uuid>, StoreError> {
        Err(StoreError::Query(sqlx::Error::PoolTimedOut))
    }

    async fn eligible_subscribers(
        &self,
        frequency: EmailFrequency,
        now: DateTime<Utc>,
    ) -> Result<Vec<Subscriber>, StoreError> {
        self.inner.eligible_subscribers(frequency, now).await
    }

    async fn update_last_sent(
        &self,
        subscriber_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.update_last_sent(subscriber_id, at).await
    }

    async fn log_delivery_attempt(
        &self,
        attempt: &NewDeliveryAttempt,
    ) -> Result<Uuid, StoreError> {
        self.inner.log_delivery_attempt(attempt).await
    }

    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<DeliveryAttempt>, StoreError> {
        self.inner.logs_for_date(date).await
    }
}

#[tokio::test]
async fn failing_to_add_configured_subscribers_does_not_stop_the_run() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(3).await;
    test_app
        .store
        .add_subscriber(&NewSubscriber {
            email: SubscriberEmail::parse(String::from("existing@mindfuel.io")).unwrap(),
            name: None,
            status: SubscriptionStatus::Active,
            frequency: EmailFrequency::Daily,
        })
        .await
        .unwrap();
    let app = Application::with_components(
        &test_app.config,
        Arc::new(ClosedRegistrationStore {
            inner: test_app.store.clone(),
        }),
        test_app.transport.clone(),
        test_app.clock.clone(),
    )
    .expect("Failed to build application.");

    let report = assert_ok!(app.run_quote_dispatch().await);

    assert_eq!(report.daily.unwrap(), delivered(1));
    assert_eq!(report.weekly.unwrap(), DispatchOutcome::NoEligibleSubscribers);
    assert!(report.summary_sent);
    assert_eq!(test_app.store.subscribers().await.len(), 1);
    assert_eq!(test_app.transport.delivered_to("existing@mindfuel.io").len(), 1);
}
