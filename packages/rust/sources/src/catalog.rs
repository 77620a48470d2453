//! Primary publication-catalog client.
//!
//! The catalog exposes a yearly table-of-contents query per venue stream;
//! the response is JSON with the per-paper entries under
//! `result.hits.hit`. Entries are returned as raw JSON values so the raw
//! payload can be persisted verbatim and normalized later.

use std::time::Duration;

use paperscout_shared::{PaperScoutError, Result, SourcesConfig, Venue};

/// Client for the primary catalog's publication search API.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl CatalogClient {
    pub fn new(config: &SourcesConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.catalog_base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    /// Query URL for one venue-year listing. The stream key appears twice:
    /// once as the directory and once in the volume file name.
    fn listing_url(&self, venue: Venue, year: u16) -> String {
        let key = venue.as_str();
        format!(
            "{}/search/publ/api?q=toc:db/conf/{key}/{key}{year}.bht:&h=1000&format=json",
            self.base_url
        )
    }

    /// Fetch all raw paper entries for one venue and year.
    ///
    /// Retries transient failures up to the configured limit. An empty hit
    /// list (a year the venue has no listing for) is an empty vec, not an
    /// error.
    pub async fn fetch_listing(&self, venue: Venue, year: u16) -> Result<Vec<serde_json::Value>> {
        let url = self.listing_url(venue, year);
        let mut last_err = String::new();

        for attempt in 1..=self.max_retries {
            match self.try_fetch(&url).await {
                Ok(hits) => {
                    if hits.is_empty() {
                        tracing::warn!(%venue, year, "no papers found in catalog listing");
                    } else {
                        tracing::info!(%venue, year, count = hits.len(), "catalog listing fetched");
                    }
                    return Ok(hits);
                }
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < self.max_retries {
                        tracing::warn!(%venue, year, attempt, error = %last_err, "catalog fetch failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(PaperScoutError::Fetch(format!(
            "catalog listing for {venue} {year} failed after {} attempts: {last_err}",
            self.max_retries
        )))
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<serde_json::Value>> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaperScoutError::Fetch(format!("invalid catalog response: {e}")))?;

        // `hit` is absent entirely when a listing has no entries.
        let hits = body
            .pointer("/result/hits/hit")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(hits)
    }
}
