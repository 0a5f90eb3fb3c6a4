use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::{DeliveryAttempt, SubscriberEmail};
use crate::email_client::EmailTransport;
use crate::store::{StoreError, SubscriberStore};

/// Aggregate of one UTC day of the delivery log.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_attempts: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Percentage in `[0, 100]`, 0 when nothing was attempted.
    pub success_rate: f64,
}

impl DailySummary {
    pub fn from_attempts(date: NaiveDate, attempts: &[DeliveryAttempt]) -> DailySummary {
        let total_attempts = attempts.len();
        let sent_count = attempts
            .iter()
            .filter(|attempt| attempt.status.is_sent())
            .count();
        let success_rate = if total_attempts == 0 {
            0.0
        } else {
            sent_count as f64 / total_attempts as f64 * 100.0
        };

        DailySummary {
            date,
            total_attempts,
            sent_count,
            failed_count: total_attempts - sent_count,
            success_rate,
        }
    }

    pub fn subject(&self) -> String {
        format!("MindFuel Daily Summary Report - {}", self.date)
    }

    pub fn recommendation(&self) -> &'static str {
        if self.failed_count > 0 {
            "Action Recommended: Please review the failed logs in the database for troubleshooting."
        } else {
            "All emails were delivered successfully today."
        }
    }

    pub fn render(&self, generated_at: DateTime<Utc>) -> String {
        format!(
            "===================================\n\
             MindFuel Daily Delivery Report\n\
             ===================================\n\
             \n\
             Date: {date}\n\
             \n\
             Summary:\n\
             \x20   - Total Emails Attempted : {total}\n\
             \x20   - Successfully Delivered : {sent}\n\
             \x20   - Failed Deliveries      : {failed}\n\
             \x20   - Success Rate           : {rate:.2}%\n\
             \n\
             Report Time: {generated_at} UTC\n\
             \n\
             {recommendation}\n\
             \n\
             Detailed errors are kept in the delivery_attempts table and the application log.\n\
             \n\
             Kind Regards,\n\
             MindFuel Automation System\n",
            date = self.date,
            total = self.total_attempts,
            sent = self.sent_count,
            failed = self.failed_count,
            rate = self.success_rate,
            generated_at = generated_at.format("%Y-%m-%d %H:%M:%S"),
            recommendation = self.recommendation(),
        )
    }
}

pub struct SummaryReporter {
    store: Arc<dyn SubscriberStore>,
    transport: Arc<dyn EmailTransport>,
    clock: Arc<dyn Clock>,
}

impl SummaryReporter {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
    ) -> SummaryReporter {
        SummaryReporter {
            store,
            transport,
            clock,
        }
    }

    #[tracing::instrument(name = "Building the daily summary", skip(self))]
    pub async fn build_daily_summary(&self, date: NaiveDate) -> Result<DailySummary, StoreError> {
        let attempts = self.store.logs_for_date(date).await?;
        let summary = DailySummary::from_attempts(date, &attempts);

        tracing::info!(
            "Fetched {} log entries for {}. Sent: {}, Failed: {}",
            summary.total_attempts,
            date,
            summary.sent_count,
            summary.failed_count
        );

        Ok(summary)
    }

    /// Sends the report once. Returns `false` on any store or transport failure.
    #[tracing::instrument(
        name = "Sending the daily summary",
        skip(self, operator),
        fields(operator = %operator)
    )]
    pub async fn send_summary(&self, date: NaiveDate, operator: &SubscriberEmail) -> bool {
        let summary = match self.build_daily_summary(date).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::error!("Failed to build the summary for {}: {:?}", date, err);
                return false;
            }
        };

        let body = summary.render(self.clock.now());

        match self
            .transport
            .send_email(operator, &summary.subject(), &body)
            .await
        {
            Ok(()) => {
                tracing::info!("Summary email successfully sent to {}", operator);
                true
            }
            Err(err) => {
                tracing::error!("Failed to send summary email to {}: {}", operator, err);
                false
            }
        }
    }
}
