use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::domain::delivery_attempt::DeliveryStatus;
use crate::domain::quote::Quote;
use crate::domain::subscriber::Subscriber;
use crate::email_client::{EmailTransport, FailureKind};

/// Bounded retries with exponential backoff and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made, so a `max_retries` of 0 is raised to 1.
    pub fn new(max_retries: u32, base_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Wait after a transient failure on `attempt` (1-based): `base_delay * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);

        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub last_error: Option<String>,
    pub attempts_used: u32,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        self.status.is_sent()
    }
}

/// Plain-text quote email for one subscriber.
pub struct QuoteEmail {
    pub subject: String,
    pub body: String,
}

impl QuoteEmail {
    pub fn compose(recipient: &Subscriber, quote: &Quote) -> QuoteEmail {
        let subject = format!("Your {} MindFuel Quote", recipient.frequency.title());
        let body = format!(
            "{greeting}\n\
             \n\
             Here is your quote for today:\n\
             \n\
             \"{text}\"\n\
             \n\
             - {author}\n\
             \n\
             Have a great day!\n\
             MindFuel Team\n",
            greeting = recipient.greeting(),
            text = quote.text,
            author = quote.author,
        );

        QuoteEmail { subject, body }
    }
}

pub struct DeliveryEngine {
    transport: Arc<dyn EmailTransport>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl DeliveryEngine {
    pub fn new(
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> DeliveryEngine {
        DeliveryEngine {
            transport,
            clock,
            policy,
        }
    }

    /// Sends `quote` to `recipient`, retrying transient failures.
    ///
    /// Nothing is persisted here: the caller records the returned outcome once.
    #[tracing::instrument(
        name = "Delivering a quote to a subscriber",
        skip(self, recipient, quote),
        fields(
            subscriber_id = %recipient.id,
            subscriber_email = %recipient.email,
            max_retries = self.policy.max_retries()
        )
    )]
    pub async fn deliver(&self, recipient: &Subscriber, quote: &Quote) -> DeliveryOutcome {
        let email = QuoteEmail::compose(recipient, quote);
        let max_retries = self.policy.max_retries();
        let mut last_error = None;
        let mut attempt = 0;

        while attempt < max_retries {
            attempt += 1;
            tracing::debug!("Attempt {}/{} to send email", attempt, max_retries);

            let err = match self
                .transport
                .send_email(&recipient.email, &email.subject, &email.body)
                .await
            {
                Ok(()) => {
                    tracing::info!("Email sent successfully (attempt {})", attempt);
                    return DeliveryOutcome {
                        status: DeliveryStatus::Sent,
                        last_error: None,
                        attempts_used: attempt,
                    };
                }
                Err(err) => err,
            };

            let kind = err.kind();
            last_error = Some(err.to_string());

            if kind == FailureKind::Fatal {
                tracing::error!("FATAL: {} (attempt {})", err, attempt);
                break;
            }

            tracing::error!("TRANSIENT: {} (attempt {})", err, attempt);

            if attempt < max_retries {
                let wait = self.policy.backoff(attempt);
                tracing::warn!(
                    "Retrying in {:.1}s (attempt {} failed with: {})",
                    wait.as_secs_f64(),
                    attempt,
                    err
                );
                self.clock.sleep(wait).await;
            }
        }

        tracing::error!(
            "FINAL FAILURE after {} attempt(s). Last error: {:?}",
            attempt,
            last_error
        );

        DeliveryOutcome {
            status: DeliveryStatus::Failed,
            last_error,
            attempts_used: attempt,
        }
    }
}
