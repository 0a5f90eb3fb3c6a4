use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{DatabaseSettings, Settings};
use crate::delivery::DeliveryEngine;
use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher};
use crate::domain::{EmailFrequency, NewSubscriber, Quote, SubscriberEmail};
use crate::email_client::{EmailTransport, SmtpClientError, SmtpEmailClient};
use crate::quotes::{FetchQuotesError, QuoteClient};
use crate::store::{PostgresSubscriberStore, SubscriberStore};
use crate::summary::SummaryReporter;

#[derive(thiserror::Error)]
pub enum ApplicationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Failed to set up the SMTP client.")]
    Smtp(#[from] SmtpClientError),
    #[error("Failed to set up the quote API client.")]
    HttpClient(#[from] reqwest::Error),
    #[error("Failed to run the database migrations.")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to fetch quotes, nothing was sent.")]
    Quotes(#[from] FetchQuotesError),
}

impl std::fmt::Debug for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        match self {
            ApplicationError::InvalidConfiguration(_) => Ok(()),
            ApplicationError::Smtp(err) => write!(f, "\nCaused by:\n\t({})", err),
            ApplicationError::HttpClient(err) => write!(f, "\nCaused by:\n\t({})", err),
            ApplicationError::Migration(err) => write!(f, "\nCaused by:\n\t({})", err),
            ApplicationError::Quotes(err) => write!(f, "\nCaused by:\n\t({})", err),
        }
    }
}

/// What one workflow run did, cadence by cadence.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub daily: Result<DispatchOutcome, DispatchError>,
    pub weekly: Result<DispatchOutcome, DispatchError>,
    pub summary_sent: bool,
}

pub struct Application {
    store: Arc<dyn SubscriberStore>,
    clock: Arc<dyn Clock>,
    quote_client: QuoteClient,
    quote_limit: usize,
    dispatcher: Dispatcher,
    reporter: SummaryReporter,
    operator: SubscriberEmail,
    seed_subscribers: Vec<NewSubscriber>,
}

impl Application {
    /// Production wiring: Postgres, SMTP and the wall clock.
    pub async fn build(config: Settings) -> Result<Application, ApplicationError> {
        let db_pool = get_connection_db_pool(&config.database);
        sqlx::migrate!("./migrations").run(&db_pool).await?;

        let sender_email = config
            .get_sender_email()
            .map_err(ApplicationError::InvalidConfiguration)?;
        let email_client = SmtpEmailClient::new(&config.smtp, sender_email)?;

        Application::with_components(
            &config,
            Arc::new(PostgresSubscriberStore::new(db_pool)),
            Arc::new(email_client),
            Arc::new(SystemClock),
        )
    }

    pub fn with_components(
        config: &Settings,
        store: Arc<dyn SubscriberStore>,
        transport: Arc<dyn EmailTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Application, ApplicationError> {
        let operator = config
            .get_operator_email()
            .map_err(ApplicationError::InvalidConfiguration)?;
        let seed_subscribers = config
            .subscribers
            .iter()
            .cloned()
            .map(NewSubscriber::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApplicationError::InvalidConfiguration)?;
        let quote_client = QuoteClient::new(
            config.get_quotes_base_url(),
            Some(config.get_quotes_timeout()),
        )?;

        let engine = DeliveryEngine::new(
            transport.clone(),
            clock.clone(),
            config.get_retry_policy(),
        );
        let dispatcher = Dispatcher::new(store.clone(), engine, clock.clone());
        let reporter = SummaryReporter::new(store.clone(), transport, clock.clone());

        Ok(Application {
            store,
            clock,
            quote_client,
            quote_limit: config.quotes.limit,
            dispatcher,
            reporter,
            operator,
            seed_subscribers,
        })
    }

    /// Makes quote selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Application {
        self.dispatcher = self.dispatcher.with_seed(seed);
        self
    }

    #[tracing::instrument(name = "Running the quote dispatch", skip(self))]
    pub async fn run_quote_dispatch(&self) -> Result<RunReport, ApplicationError> {
        self.add_seed_subscribers().await;

        let quotes = self.quote_client.fetch_quotes(self.quote_limit).await?;

        let daily = self.dispatch(EmailFrequency::Daily, &quotes).await;
        let weekly = self.dispatch(EmailFrequency::Weekly, &quotes).await;

        let date = self.clock.now().date_naive();
        let summary_sent = self.reporter.send_summary(date, &self.operator).await;

        Ok(RunReport {
            date,
            daily,
            weekly,
            summary_sent,
        })
    }

    /// A subscriber that cannot be added is skipped, the others still get their quote.
    async fn add_seed_subscribers(&self) {
        for subscriber in &self.seed_subscribers {
            if let Err(err) = self.store.add_subscriber(subscriber).await {
                tracing::error!(
                    "Failed to add configured subscriber {}: {:?}",
                    subscriber.email,
                    err
                );
            }
        }
    }

    async fn dispatch(
        &self,
        frequency: EmailFrequency,
        quotes: &[Quote],
    ) -> Result<DispatchOutcome, DispatchError> {
        let outcome = self
            .dispatcher
            .dispatch_to_subscribers(frequency, quotes)
            .await;

        match &outcome {
            Ok(DispatchOutcome::AllFailed(counts)) => {
                tracing::error!("Every {} delivery failed ({} total)", frequency, counts.failed)
            }
            Ok(_) => {}
            Err(err) => tracing::error!("{} dispatch aborted: {:?}", frequency.title(), err),
        }

        outcome
    }
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
