use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::delivery::{DeliveryEngine, DeliveryOutcome};
use crate::domain::{EmailFrequency, NewDeliveryAttempt, Quote, Subscriber};
use crate::store::{StoreError, SubscriberStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub sent: usize,
    pub failed: usize,
}

/// Result of one cadence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoEligibleSubscribers,
    /// At least one subscriber got their quote.
    Delivered(DispatchCounts),
    AllFailed(DispatchCounts),
}

impl DispatchOutcome {
    pub fn counts(&self) -> DispatchCounts {
        match self {
            DispatchOutcome::NoEligibleSubscribers => DispatchCounts::default(),
            DispatchOutcome::Delivered(counts) | DispatchOutcome::AllFailed(counts) => *counts,
        }
    }

    fn from_counts(counts: DispatchCounts) -> DispatchOutcome {
        if counts.sent > 0 {
            DispatchOutcome::Delivered(counts)
        } else {
            DispatchOutcome::AllFailed(counts)
        }
    }
}

#[derive(thiserror::Error)]
pub enum DispatchError {
    #[error("Cannot dispatch quotes from an empty quote batch.")]
    EmptyBatch,
    #[error("Failed to get eligible subscribers from the store.")]
    Store(#[source] StoreError),
}

impl std::fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::EmptyBatch => write!(f, "{}", self),
            DispatchError::Store(err) => write!(f, "{}\nCaused by:\n\t({:?})", self, err),
        }
    }
}

/// A quote batch holding at least one quote.
struct QuoteBatch<'a> {
    first: &'a Quote,
    quotes: &'a [Quote],
}

impl<'a> QuoteBatch<'a> {
    fn new(quotes: &'a [Quote]) -> Option<QuoteBatch<'a>> {
        quotes.first().map(|first| QuoteBatch { first, quotes })
    }
}

pub struct Dispatcher {
    store: Arc<dyn SubscriberStore>,
    engine: DeliveryEngine,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        engine: DeliveryEngine,
        clock: Arc<dyn Clock>,
    ) -> Dispatcher {
        Dispatcher {
            store,
            engine,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes quote selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Dispatcher {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[tracing::instrument(
        name = "Dispatching quotes to subscribers",
        skip(self, quote_batch),
        fields(quote_batch_size = quote_batch.len())
    )]
    pub async fn dispatch_to_subscribers(
        &self,
        frequency: EmailFrequency,
        quote_batch: &[Quote],
    ) -> Result<DispatchOutcome, DispatchError> {
        tracing::info!("Starting {} email delivery process", frequency);

        let subscribers = self
            .store
            .eligible_subscribers(frequency, self.clock.now())
            .await
            .map_err(DispatchError::Store)?;

        if subscribers.is_empty() {
            tracing::warn!("No eligible {} subscribers found", frequency);
            return Ok(DispatchOutcome::NoEligibleSubscribers);
        }

        let quote_batch = QuoteBatch::new(quote_batch).ok_or_else(|| {
            tracing::error!("Quote batch is empty, nothing can be sent");
            DispatchError::EmptyBatch
        })?;

        tracing::info!("Found {} eligible {} subscribers", subscribers.len(), frequency);

        let mut counts = DispatchCounts::default();

        for subscriber in &subscribers {
            let quote = self.pick_quote(&quote_batch);

            match self.deliver_and_record(subscriber, &quote).await {
                Ok(outcome) if outcome.is_sent() => counts.sent += 1,
                Ok(_) => counts.failed += 1,
                Err(err) => {
                    tracing::error!(
                        "Failed to process subscriber {}: {:?}",
                        subscriber.email,
                        err
                    );
                    counts.failed += 1;
                }
            }
        }

        tracing::info!(
            "{} email summary: {} sent, {} failed.",
            frequency.title(),
            counts.sent,
            counts.failed
        );

        Ok(DispatchOutcome::from_counts(counts))
    }

    fn pick_quote(&self, quote_batch: &QuoteBatch<'_>) -> Quote {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        quote_batch
            .quotes
            .choose(&mut *rng)
            .unwrap_or(quote_batch.first)
            .clone()
    }

    #[tracing::instrument(
        name = "Delivering and recording a quote",
        skip(self, subscriber, quote),
        fields(subscriber_id = %subscriber.id, quote_author = %quote.author)
    )]
    async fn deliver_and_record(
        &self,
        subscriber: &Subscriber,
        quote: &Quote,
    ) -> Result<DeliveryOutcome, StoreError> {
        let outcome = self.engine.deliver(subscriber, quote).await;
        let now = self.clock.now();

        self.store
            .log_delivery_attempt(&NewDeliveryAttempt {
                subscriber_id: subscriber.id,
                email: subscriber.email.clone(),
                status: outcome.status,
                error_message: outcome.last_error.clone(),
                attempt_count: outcome.attempts_used,
                attempted_at: now,
            })
            .await?;

        if outcome.is_sent() {
            self.store.update_last_sent(subscriber.id, now).await?;
        }

        Ok(outcome)
    }
}
