use chrono::Duration;

use mindfuel::email_client::SendEmailError;

use crate::helpers::TestApp;

#[tokio::test]
async fn summary_only_covers_the_current_day() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(3).await;

    test_app.app.run_quote_dispatch().await.unwrap();
    test_app.clock.advance(Duration::days(1));
    let report = test_app.app.run_quote_dispatch().await.unwrap();

    let summary = test_app
        .transport
        .delivered_to(&test_app.operator_email())
        .pop()
        .unwrap();
    assert_eq!(report.date.to_string(), "2026-03-03");
    assert_eq!(summary.subject, "MindFuel Daily Summary Report - 2026-03-03");
    assert!(summary.body.contains("Total Emails Attempted : 1"));
    assert!(summary.body.contains("All emails were delivered successfully today."));
}

#[tokio::test]
async fn summary_failure_does_not_fail_the_run() {
    let test_app = TestApp::spawn_app().await;
    test_app.mount_quotes(3).await;
    test_app
        .transport
        .fail_for(&test_app.operator_email(), SendEmailError::AuthenticationRejected);

    let report = test_app.app.run_quote_dispatch().await.unwrap();

    assert!(!report.summary_sent);
    assert_eq!(report.daily.unwrap().counts().sent, 1);
    assert_eq!(
        test_app
            .transport
            .attempts()
            .iter()
            .filter(|email| email.recipient == test_app.operator_email())
            .count(),
        1
    );
}
