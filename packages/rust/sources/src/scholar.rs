//! Secondary scholarly-metadata API client.
//!
//! One bulk search per venue-year returns every indexed paper with its
//! abstract and external identifiers. Responses page through a continuation
//! token; all pages are drained into one vec of raw entries.

use std::time::Duration;

use paperscout_shared::{PaperScoutError, Result, SourcesConfig, Venue};

/// Fields requested with every bulk search.
const FIELDS: &str = "title,abstract,year,venue,externalIds,authors";

/// Client for the secondary metadata source's bulk paper search.
pub struct ScholarClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ScholarClient {
    pub fn new(config: &SourcesConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.scholar_base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    /// Fetch all raw entries for one venue and year, draining pagination.
    ///
    /// The venue is queried by its full indexed name, not the stream key.
    pub async fn fetch_listing(&self, venue: Venue, year: u16) -> Result<Vec<serde_json::Value>> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.fetch_page(venue, year, token.as_deref()).await?;
            entries.extend(page.data);
            match page.token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        if entries.is_empty() {
            tracing::warn!(%venue, year, "no papers found in scholar listing");
        } else {
            tracing::info!(%venue, year, count = entries.len(), "scholar listing fetched");
        }
        Ok(entries)
    }

    async fn fetch_page(
        &self,
        venue: Venue,
        year: u16,
        token: Option<&str>,
    ) -> Result<Page> {
        let url = format!("{}/graph/v1/paper/search/bulk", self.base_url);
        let year_param = year.to_string();
        let mut params = vec![
            ("query", "*"),
            ("venue", venue.scholar_name()),
            ("year", year_param.as_str()),
            ("fields", FIELDS),
        ];
        if let Some(token) = token {
            params.push(("token", token));
        }

        let mut last_err = String::new();
        for attempt in 1..=self.max_retries {
            match self.try_fetch(&url, &params).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < self.max_retries {
                        tracing::warn!(%venue, year, attempt, error = %last_err, "scholar fetch failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(PaperScoutError::Fetch(format!(
            "scholar listing for {venue} {year} failed after {} attempts: {last_err}",
            self.max_retries
        )))
    }

    async fn try_fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Page> {
        let response = self
            .http
            .get(url)
            .query(params)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaperScoutError::Fetch(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaperScoutError::Fetch(format!("invalid scholar response: {e}")))?;

        let data = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let token = body
            .get("token")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(Page { data, token })
    }
}

struct Page {
    data: Vec<serde_json::Value>,
    token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> SourcesConfig {
        SourcesConfig {
            scholar_base_url: base_url.to_string(),
            max_retries: 2,
            retry_delay_secs: 0,
            ..SourcesConfig::default()
        }
    }

    #[tokio::test]
    async fn queries_by_full_venue_name() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "total": 1,
            "data": [{"paperId": "X1", "title": "A Paper", "abstract": "Text."}]
        });
        Mock::given(method("GET"))
            .and(path("/graph/v1/paper/search/bulk"))
            .and(query_param("venue", "USENIX Security Symposium"))
            .and(query_param("year", "2023"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ScholarClient::new(&test_config(&server.uri()));
        let entries = client.fetch_listing(Venue::Uss, 2023).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["paperId"], "X1");
    }

    #[tokio::test]
    async fn drains_pagination_token() {
        let server = MockServer::start().await;
        let page1 = serde_json::json!({
            "total": 2,
            "token": "NEXT",
            "data": [{"paperId": "A"}]
        });
        let page2 = serde_json::json!({
            "total": 2,
            "data": [{"paperId": "B"}]
        });
        Mock::given(method("GET"))
            .and(query_param("token", "NEXT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page2))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page1))
            .mount(&server)
            .await;

        let client = ScholarClient::new(&test_config(&server.uri()));
        let entries = client.fetch_listing(Venue::Ccs, 2020).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["paperId"], "A");
        assert_eq!(entries[1]["paperId"], "B");
    }

    #[tokio::test]
    async fn upstream_error_surfaces_as_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = ScholarClient::new(&test_config(&server.uri()));
        let result = client.fetch_listing(Venue::Sp, 2021).await;
        assert!(matches!(result, Err(PaperScoutError::Fetch(_))));
    }
}
