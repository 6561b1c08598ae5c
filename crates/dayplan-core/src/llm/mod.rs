//! Language model clients.
//!
//! The composer only needs "prompt in, text out", so the trait is a single
//! `complete` call. Providers live in their own modules; [`create_client`]
//! picks one from [`LlmConfig`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

mod error;
mod gemini;
mod openai;

pub use error::LlmError;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::LlmConfig;

/// Initial backoff delay between retries.
const INITIAL_BACKOFF_MS: u64 = 500;

/// A text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Send one prompt and return the raw text of the reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Create a client for the configured provider, wrapped with retries when
/// `max_retries` is non-zero. Each retried attempt gets the configured
/// request timeout of its own.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    let client: Arc<dyn LanguageModel> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiClient::from_config(config)?),
        "openai" => Arc::new(OpenAiClient::from_config(config)?),
        other => {
            return Err(LlmError::Configuration(format!(
                "unknown LLM provider '{other}' (supported: gemini, openai)"
            )));
        }
    };

    let retries = config.effective_retries();
    if retries == 0 {
        return Ok(client);
    }
    Ok(Arc::new(
        Retrying::new(client, retries).with_attempt_timeout(config.timeout()),
    ))
}

/// Turn a non-success HTTP response into an [`LlmError`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(1);
        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    let message = response.text().await.unwrap_or_default();
    Err(LlmError::ApiError {
        status: status.as_u16(),
        message,
    })
}

/// Retries retryable failures of an inner model with exponential backoff.
pub struct Retrying {
    inner: Arc<dyn LanguageModel>,
    max_retries: u32,
    initial_backoff: Duration,
    attempt_timeout: Option<Duration>,
}

impl Retrying {
    pub fn new(inner: Arc<dyn LanguageModel>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries: max_retries.min(LlmConfig::MAX_RETRIES_CAP),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            attempt_timeout: None,
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Abandon an attempt that runs longer than `timeout`; the abandoned
    /// attempt counts as a retryable [`LlmError::Timeout`].
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    async fn attempt(&self, prompt: &str) -> Result<String, LlmError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(prompt))
                .await
                .unwrap_or(Err(LlmError::Timeout(limit))),
            None => self.inner.complete(prompt).await,
        }
    }

    fn backoff(&self, attempt: u32, err: &LlmError) -> Duration {
        let exp = self.initial_backoff * 2u32.pow(attempt - 1);
        match err.retry_after() {
            Some(after) => after.min(LlmConfig::MAX_RETRY_WAIT).max(exp),
            None => exp,
        }
    }
}

#[async_trait]
impl LanguageModel for Retrying {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff(attempt, &e);
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        backoff_ms = wait.as_millis() as u64,
                        error = %e,
                        "complete: retrying after transient error"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
