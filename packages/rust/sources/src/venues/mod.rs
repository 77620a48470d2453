//! Per-venue paper-page adapters.
//!
//! Each supported venue publishes paper pages in its own shape; an adapter
//! knows how to turn a catalog landing URL into the page to request and how
//! to pull the abstract (and, where available, a PDF link) out of the HTML.
//! Unlike listing fetches, a page that yields no abstract is a `None`, not an
//! error: layouts drift and single pages go missing without failing a batch.

mod ccs;
mod ndss;
mod sp;
mod uss;

use std::time::Duration;

use paperscout_shared::{PaperScoutError, Result, SourcesConfig, Venue};
use url::Url;

pub use ccs::CcsAdapter;
pub use ndss::NdssAdapter;
pub use sp::SpAdapter;
pub use uss::UssAdapter;

/// Browser-like UA; some publisher sites reject the default client string.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What an adapter extracts from one paper page.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPageInfo {
    pub abstract_text: String,
    /// Direct PDF link, absolute. Not every venue exposes one.
    pub pdf_url: Option<String>,
}

/// Venue-specific page handling.
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Rewrite the catalog landing URL into the URL to actually request.
    /// The default is the identity; CCS needs a DOI-resolver rewrite.
    fn page_url(&self, url: &str) -> String {
        url.to_string()
    }

    /// Extract the abstract from the raw page HTML.
    /// `None` means the page holds no recognizable abstract.
    fn extract(&self, html: &str) -> Option<PaperPageInfo>;

    /// Adapter name for tracing.
    fn name(&self) -> &'static str {
        self.venue().as_str()
    }
}

/// Look up the adapter for a venue. Every venue has exactly one.
pub fn adapter_for(venue: Venue) -> &'static dyn VenueAdapter {
    match venue {
        Venue::Ccs => &CcsAdapter,
        Venue::Ndss => &NdssAdapter,
        Venue::Sp => &SpAdapter,
        Venue::Uss => &UssAdapter,
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Fetches paper pages and runs the matching adapter over them.
pub struct AbstractFetcher {
    http: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
    rate_limit: Duration,
}

impl AbstractFetcher {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaperScoutError::Fetch(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            max_retries: 3,
            retry_delay: Duration::from_secs(config.retry_delay_secs.min(6)),
            rate_limit: Duration::from_millis(config.rate_limit_ms),
        })
    }

    /// Fetch `url`'s page and extract its abstract via the venue's adapter.
    ///
    /// `Ok(None)` means the page was fetched but held no usable abstract.
    /// Transport failures after all retries are an error so the caller can
    /// count them separately from genuinely abstract-less pages.
    pub async fn fetch_page_info(&self, venue: Venue, url: &str) -> Result<Option<PaperPageInfo>> {
        let adapter = adapter_for(venue);
        let page_url = Url::parse(&adapter.page_url(url))
            .map_err(|e| PaperScoutError::Fetch(format!("invalid paper URL {url}: {e}")))?;

        let mut last_err = String::new();
        for attempt in 1..=self.max_retries {
            match self.try_fetch(&page_url).await {
                Ok(html) => {
                    let info = adapter.extract(&html);
                    if info.is_none() {
                        tracing::warn!(adapter = adapter.name(), url = %page_url, "no abstract found on page");
                    }
                    return Ok(info);
                }
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < self.max_retries {
                        tracing::warn!(adapter = adapter.name(), url = %page_url, attempt, error = %last_err, "page fetch failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(PaperScoutError::Fetch(format!(
            "page fetch for {page_url} failed after {} attempts: {last_err}",
            self.max_retries
        )))
    }

    /// Pause between successive page fetches. Publisher sites rate-limit
    /// aggressively; callers invoke this between papers.
    pub async fn pace(&self) {
        tokio::time::sleep(self.rate_limit).await;
    }

    async fn try_fetch(&self, url: &Url) -> Result<String> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
