use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time;

use crate::domain::quote::Quote;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);
const UNKNOWN_AUTHOR: &str = "Unknown";

/// Client for the ZenQuotes batch endpoint.
pub struct QuoteClient {
    http_client: Client,
    base_url: String,
    timeout: time::Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchQuotesError {
    #[error("Request timed out after {0:?}.")]
    Timeout(time::Duration),
    #[error("Unable to connect to the quote API. Check your internet connection or API status.")]
    Connection(#[source] reqwest::Error),
    #[error("Quote API returned bad HTTP status: {0}")]
    Status(StatusCode),
    #[error("Malformed JSON received from the quote API.")]
    Malformed(#[source] serde_json::Error),
    #[error("Unexpected network issue occurred while contacting the quote API.")]
    Request(#[source] reqwest::Error),
    #[error("Quote API returned no valid quotes.")]
    EmptyResult,
}

impl QuoteClient {
    pub fn new(
        base_url: String,
        timeout: Option<time::Duration>,
    ) -> Result<QuoteClient, reqwest::Error> {
        let timeout = timeout.unwrap_or(REQUEST_TIMEOUT);
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(QuoteClient {
            http_client,
            base_url,
            timeout,
        })
    }

    /// Fetches up to `limit` quotes, dropping malformed entries.
    #[tracing::instrument(name = "Fetching quotes from the quote API", skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_quotes(&self, limit: usize) -> Result<Vec<Quote>, FetchQuotesError> {
        let url = format!("{}/api/quotes", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        tracing::debug!("Quote API responded with status {}", status);
        if !status.is_success() {
            return Err(FetchQuotesError::Status(status));
        }

        let body = response.bytes().await.map_err(|err| self.classify(err))?;
        let entries: Vec<Value> =
            serde_json::from_slice(&body).map_err(FetchQuotesError::Malformed)?;

        let quotes: Vec<Quote> = entries
            .iter()
            .take(limit)
            .filter_map(|entry| {
                let quote = parse_entry(entry);
                if quote.is_none() {
                    tracing::warn!("Skipping malformed quote entry: {}", entry);
                }
                quote
            })
            .collect();

        if quotes.is_empty() {
            tracing::error!("No valid quotes returned from the quote API.");
            return Err(FetchQuotesError::EmptyResult);
        }

        tracing::info!("Successfully fetched {} quotes", quotes.len());

        Ok(quotes)
    }

    fn classify(&self, err: reqwest::Error) -> FetchQuotesError {
        if err.is_timeout() {
            FetchQuotesError::Timeout(self.timeout)
        } else if err.is_connect() {
            FetchQuotesError::Connection(err)
        } else {
            FetchQuotesError::Request(err)
        }
    }
}

fn parse_entry(entry: &Value) -> Option<Quote> {
    let text = entry.get("q")?.as_str()?.trim();
    let author = entry.get("a")?.as_str()?.trim();

    if text.is_empty() {
        return None;
    }

    let author = if author.is_empty() {
        UNKNOWN_AUTHOR
    } else {
        author
    };

    Some(Quote::new(text, author))
}
