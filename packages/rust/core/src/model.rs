//! Model collaborator: relevance judgments and keyword extraction.
//!
//! The client talks to an OpenAI-compatible chat-completions endpoint and
//! parses the first choice's message content as JSON into a closed result
//! type. There is no free-form interpretation of model output: a response
//! that does not deserialize into the expected shape is a model error.

use std::time::Duration;

use paperscout_shared::{ModelConfig, PaperScoutError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a relevance judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceJudgment {
    pub relevant: bool,
    /// One-sentence justification, kept for auditing.
    #[serde(default)]
    pub rationale: String,
}

/// Outcome of a keyword extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSet {
    pub keywords: Vec<String>,
}

/// The judgment surface the filter and keyword flows depend on.
///
/// Production code uses [`ModelClient`]; tests substitute scripted mocks
/// and count invocations.
#[allow(async_fn_in_trait)]
pub trait ModelCollaborator {
    async fn judge_relevance(
        &self,
        title: &str,
        abstract_text: Option<&str>,
        query: &str,
    ) -> Result<RelevanceJudgment>;

    async fn extract_keywords(
        &self,
        title: &str,
        abstract_text: Option<&str>,
    ) -> Result<KeywordSet>;
}

const RELEVANCE_SYSTEM_PROMPT: &str = "You are an assistant that analyzes the relevance of \
academic papers based on their titles and abstracts. Determine whether the given paper is \
relevant to the user-provided keywords or query, using only the paper title and abstract. \
Respond with a JSON object: {\"relevant\": true or false, \"rationale\": \"one sentence\"}.";

const KEYWORDS_SYSTEM_PROMPT: &str = "You extract keywords from academic papers. Based on the \
provided title and abstract, extract 5 keywords: first keywords for the research domain \
(avoiding overly broad terms like \"security\" or \"machine learning\"), then keywords for the \
research problem. Respond with a JSON object: {\"keywords\": [\"k1\", \"k2\", \"k3\", \"k4\", \"k5\"]}.";

/// Chat-completions client.
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_retries: u32,
}

impl ModelClient {
    /// Build a client from config. The API key is resolved by the caller
    /// (it comes from an env var, never from the config file).
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaperScoutError::Model(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries.max(1),
        })
    }

    /// One schema-validated completion: send messages, parse the first
    /// choice's content as JSON into `T`. Retries with linear backoff.
    async fn complete<T: DeserializeOwned>(&self, system: &str, user: String) -> Result<T> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let mut last_err = String::new();
        for attempt in 1..=self.max_retries {
            match self.try_complete(&url, &body).await {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < self.max_retries {
                        tracing::warn!(attempt, error = %last_err, "model call failed, retrying");
                        tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(PaperScoutError::Model(format!(
            "model call failed after {} attempts: {last_err}",
            self.max_retries
        )))
    }

    async fn try_complete<T: DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PaperScoutError::Model(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaperScoutError::Model(e.to_string()))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| PaperScoutError::Model(format!("invalid response body: {e}")))?;
        parse_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a completion response and
/// deserialize it as JSON.
fn parse_content<T: DeserializeOwned>(json: &Value) -> Result<T> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| PaperScoutError::Model("response has no message content".into()))?;
    serde_json::from_str(content)
        .map_err(|e| PaperScoutError::Model(format!("content is not the expected JSON shape: {e}")))
}

fn paper_content(title: &str, abstract_text: Option<&str>) -> String {
    format!(
        "Title: {title}\nAbstract: {}",
        abstract_text.unwrap_or("N/A")
    )
}

impl ModelCollaborator for ModelClient {
    async fn judge_relevance(
        &self,
        title: &str,
        abstract_text: Option<&str>,
        query: &str,
    ) -> Result<RelevanceJudgment> {
        let user = format!(
            "{}\nUser Keywords/Query: {query}",
            paper_content(title, abstract_text)
        );
        self.complete(RELEVANCE_SYSTEM_PROMPT, user).await
    }

    async fn extract_keywords(
        &self,
        title: &str,
        abstract_text: Option<&str>,
    ) -> Result<KeywordSet> {
        self.complete(KEYWORDS_SYSTEM_PROMPT, paper_content(title, abstract_text))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> ModelConfig {
        ModelConfig {
            base_url: base_url.to_string(),
            model: "test-model".into(),
            max_retries: 2,
            ..ModelConfig::default()
        }
    }

    fn completion_body(content: &str) -> Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn parses_typed_content() {
        let body = completion_body(r#"{"relevant": true, "rationale": "on topic"}"#);
        let judgment: RelevanceJudgment = parse_content(&body).unwrap();
        assert!(judgment.relevant);
        assert_eq!(judgment.rationale, "on topic");
    }

    #[test]
    fn malformed_content_is_a_model_error() {
        let body = completion_body("the paper is probably relevant");
        let result: Result<RelevanceJudgment> = parse_content(&body);
        assert!(matches!(result, Err(PaperScoutError::Model(_))));
    }

    #[tokio::test]
    async fn judge_relevance_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"relevant": false, "rationale": "different domain"}"#,
            )))
            .mount(&server)
            .await;

        let client = ModelClient::new(&test_config(&server.uri()), "key".into()).unwrap();
        let judgment = client
            .judge_relevance("A Paper", Some("About something else."), "fuzzing")
            .await
            .unwrap();
        assert!(!judgment.relevant);
    }

    #[tokio::test]
    async fn extract_keywords_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"keywords": ["fuzzing", "firmware"]}"#,
            )))
            .mount(&server)
            .await;

        let client = ModelClient::new(&test_config(&server.uri()), "key".into()).unwrap();
        let set = client.extract_keywords("A Paper", None).await.unwrap();
        assert_eq!(set.keywords, vec!["fuzzing", "firmware"]);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.max_retries = 2;
        let client = ModelClient::new(&config, "key".into()).unwrap();
        let result = client.judge_relevance("T", None, "q").await;
        assert!(matches!(result, Err(PaperScoutError::Model(_))));
    }
}
