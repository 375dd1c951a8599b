//! Machine translation backends
//!
//! - `GoogleTranslator`: the unauthenticated `translate_a/single` endpoint,
//!   with bounded retry on rate limiting, server errors and transport errors
//! - `MockTranslator`: deterministic output for tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TranslationConfig;
use crate::error::{Error, Result};

/// Translates a single text between two language codes
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Client for the Google Translate `gtx` endpoint
#[derive(Clone)]
pub struct GoogleTranslator {
    http_client: Client,
    endpoint: String,
    /// Total attempts per text, including the first
    max_attempts: u32,
    /// Backoff unit; the wait after attempt n is n × this
    retry_delay: Duration,
}

impl GoogleTranslator {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        Ok(Self::new(&config.endpoint, config.timeout)?
            .with_retry(config.max_retries, config.retry_delay))
    }

    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn backoff(&self, attempt: u32) {
        if attempt < self.max_attempts {
            tokio::time::sleep(self.retry_delay * attempt).await;
        }
    }
}

/// Join the translated segments of a `translate_a/single` response
///
/// The body looks like `[[["Bonjour","Hello",null,null,1], ...], null, "en"]`;
/// the translation is the first element of every segment in `data[0]`.
fn parse_response(data: &Value) -> Result<String> {
    let segments = data
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Translation("Unexpected translation response shape".into()))?;

    Ok(segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect())
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.is_empty() || source == target {
            return Ok(text.to_string());
        }

        let url = format!("{}/translate_a/single", self.endpoint);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let response = self
                .http_client
                .get(&url)
                .query(&[
                    ("client", "gtx"),
                    ("sl", source),
                    ("tl", target),
                    ("dt", "t"),
                    ("q", text),
                ])
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let data: Value = resp.json().await?;
                    let translated = parse_response(&data)?;
                    if translated.is_empty() {
                        debug!(lang = target, "Empty translation, keeping source text");
                        return Ok(text.to_string());
                    }
                    return Ok(translated);
                }
                Ok(resp) if is_retryable(resp.status()) => {
                    let status = resp.status();
                    warn!(
                        lang = target,
                        %status,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Translation request throttled or failed, retrying"
                    );
                    last_error = Some(Error::Translation(format!(
                        "Translation endpoint returned {}",
                        status
                    )));
                }
                Ok(resp) => {
                    return Err(Error::Translation(format!(
                        "Translation endpoint returned {} for {}",
                        resp.status(),
                        target
                    )));
                }
                Err(e) => {
                    warn!(lang = target, error = %e, attempt, "Translation request failed, retrying");
                    last_error = Some(Error::Http(e));
                }
            }

            self.backoff(attempt).await;
        }

        Err(last_error
            .unwrap_or_else(|| Error::Translation(format!("All retries failed for {}", target))))
    }

    fn name(&self) -> &str {
        "google"
    }
}

/// Mock translator for testing
///
/// Returns `"[<target>] <text>"`; texts in the failing set return an error.
#[derive(Clone, Default)]
pub struct MockTranslator {
    failing: Arc<HashSet<String>>,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail whenever one of these exact texts is translated
    pub fn failing_on<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: Arc::new(texts.into_iter().map(Into::into).collect()),
            calls: Arc::default(),
        }
    }

    /// Number of translate calls that reached the backend
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.is_empty() || source == target {
            return Ok(text.to_string());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(text) {
            return Err(Error::Translation(format!("mock failure for {:?}", text)));
        }
        Ok(format!("[{}] {}", target, text))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
