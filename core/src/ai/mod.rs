pub mod align;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::EndpointConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("API returned status {status} {reason}; response: {body_excerpt}")]
    Http {
        status: u16,
        reason: String,
        body_excerpt: String,
    },
    #[error("API request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("API request failed: {0}")]
    Network(String),
    #[error("API URL seems to point at a web page instead of an API endpoint; check the configured URL. Response: {body_excerpt}")]
    HtmlDocument { body_excerpt: String },
    #[error("API response is not valid JSON ({message}); response: {body_excerpt}")]
    MalformedResponse {
        message: String,
        body_excerpt: String,
    },
}

/// A completion service that turns one prompt into generated text.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    fn name(&self) -> &str;

    /// Sends `prompt` and returns the generated text, or `None` when the reply
    /// was valid JSON in none of the known shapes.
    async fn complete(&self, prompt: &str) -> Result<Option<String>, TranslationError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Reply shapes the client understands, tried in declaration order. Only the
/// first element of `results` and `choices` is read, so later elements may
/// have any layout.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletionBody {
    /// `{"response": "..."}`
    Generate { response: String },
    /// `{"results": [{"text": "..."}]}`
    Results { results: Vec<Value> },
    /// `{"choices": [{"message": {"content": "..."}}]}` or `{"choices": [{"text": "..."}]}`
    Choices { choices: Vec<Value> },
    Unrecognized(Value),
}

fn str_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

impl CompletionBody {
    fn shape(&self) -> &'static str {
        match self {
            CompletionBody::Generate { .. } => "response",
            CompletionBody::Results { .. } => "results",
            CompletionBody::Choices { .. } => "choices",
            CompletionBody::Unrecognized(_) => "unrecognized",
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            CompletionBody::Generate { response } => Some(response),
            CompletionBody::Results { results } => {
                str_field(results.first().and_then(|item| item.get("text")))
            }
            CompletionBody::Choices { choices } => choices.first().and_then(|choice| {
                str_field(choice.pointer("/message/content")).or_else(|| str_field(choice.get("text")))
            }),
            CompletionBody::Unrecognized(_) => None,
        }
    }
}

/// Parses an endpoint reply body and pulls out the generated text.
///
/// Bodies that are not JSON fail; an HTML page gets its own error because it
/// almost always means the URL points at a web UI. JSON in an unknown shape
/// yields `Ok(None)`.
pub fn parse_completion_body(body: &str) -> Result<Option<String>, TranslationError> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        if body.to_lowercase().contains("<!doctype html>") {
            TranslationError::HtmlDocument {
                body_excerpt: excerpt(body),
            }
        } else {
            TranslationError::MalformedResponse {
                message: err.to_string(),
                body_excerpt: excerpt(body),
            }
        }
    })?;

    let parsed = serde_json::from_value::<CompletionBody>(value).map_err(|err| {
        TranslationError::MalformedResponse {
            message: err.to_string(),
            body_excerpt: excerpt(body),
        }
    })?;

    let shape = parsed.shape();
    let text = parsed.into_text();
    match &text {
        Some(_) => debug!("parsed completion using the {shape} shape"),
        None => warn!("unrecognized API response shape: {}", excerpt(body)),
    }
    Ok(text)
}

fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(BODY_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn normalize_api_key(key: Option<String>) -> Option<String> {
    key.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Posts `{model, prompt, stream: false}` to a generate-style HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Result<Self, TranslationError> {
        let client = Client::builder()
            .build()
            .map_err(|err| TranslationError::Network(err.to_string()))?;
        let url = url.into();

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, TranslationError> {
        Ok(Self::new(config.resolved_api_url(), config.model.trim())?
            .with_api_key(config.bearer_token())
            .with_timeout(config.timeout()))
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = normalize_api_key(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends a short probe prompt to check that the endpoint and model answer.
    pub async fn test_connection(&self) -> Result<(), TranslationError> {
        self.post("你好", CONNECTION_TEST_TIMEOUT).await.map(|_| ())
    }

    async fn post(&self, prompt: &str, timeout: Duration) -> Result<String, TranslationError> {
        debug!("posting prompt to {} with model {}", self.url, self.model);

        let mut request = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| map_request_error(err, timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| map_request_error(err, timeout))?;

        if status != StatusCode::OK {
            return Err(TranslationError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body_excerpt: excerpt(&body),
            });
        }

        Ok(body)
    }
}

fn map_request_error(err: reqwest::Error, timeout: Duration) -> TranslationError {
    if err.is_timeout() {
        TranslationError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else {
        TranslationError::Network(err.to_string())
    }
}

#[async_trait]
impl CompletionEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<Option<String>, TranslationError> {
        let body = self.post(prompt, self.timeout).await?;
        parse_completion_body(&body)
    }
}

/// Translates one batch: renders the prompt, calls the endpoint and aligns
/// the reply to `sources`. An unrecognized reply shape yields the sources
/// unchanged; transport and parse failures are returned to the caller.
pub async fn translate_batch<E>(endpoint: &E, sources: &[String]) -> Result<Vec<String>, TranslationError>
where
    E: CompletionEndpoint + ?Sized,
{
    let prompt = prompt::render_prompt(sources);
    match endpoint.complete(&prompt).await? {
        Some(text) => Ok(align::align_response(&text, sources).values),
        None => {
            warn!(
                "{} returned an unrecognized response; keeping {} source values",
                endpoint.name(),
                sources.len()
            );
            Ok(sources.to_vec())
        }
    }
}
