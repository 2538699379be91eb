use crate::parser;
use crate::types::{FetchConfig, Item, Result, SiftError};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one fetch cycle: every item that could be retrieved, plus the
/// endpoints that failed. A failed endpoint never aborts the batch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<Item>,
    pub failed: Vec<String>,
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .expect("failed to build HTTP client");

        Self { client, config }
    }

    /// Fetch every endpoint in the map concurrently (bounded) and collect the
    /// parsed items. Endpoint fetches are independent; results are merged
    /// after all of them complete. No retry happens within a cycle.
    pub async fn fetch_all(&self, endpoints: &HashMap<String, i64>) -> FetchOutcome {
        let fetches = endpoints.iter().map(|(url, &source_id)| async move {
            let result = self.fetch_one(url, source_id).await;
            (url.clone(), result)
        });

        let results: Vec<(String, Result<Vec<Item>>)> = stream::iter(fetches)
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut outcome = FetchOutcome::default();
        for (url, result) in results {
            match result {
                Ok(items) => {
                    debug!("fetched {} items from {}", items.len(), url);
                    outcome.items.extend(items);
                }
                Err(e) => {
                    warn!("failed to fetch {}: {}", url, e);
                    outcome.failed.push(url);
                }
            }
        }

        info!(
            "fetch cycle complete: {} items, {}/{} endpoints failed",
            outcome.items.len(),
            outcome.failed.len(),
            endpoints.len()
        );
        outcome
    }

    async fn fetch_one(&self, url: &str, source_id: i64) -> Result<Vec<Item>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let body = body.strip_prefix('\u{feff}').unwrap_or(&body);

        if !parser::looks_like_feed(body) {
            return Err(SiftError::BadContent(format!(
                "no feed markup in response from {}",
                url
            )));
        }

        parser::parse_document(body, source_id)
    }
}
