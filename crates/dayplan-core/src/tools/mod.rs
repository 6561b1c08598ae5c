//! Auxiliary data sources consulted between the two model passes.
//!
//! Each tool is a trait so the composer can run with real HTTP clients, with
//! test doubles, or with the tool missing entirely.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod invoker;
pub mod search;
pub mod selection;
pub mod weather;

pub use invoker::{ToolInvoker, ToolResults};
pub use search::{SearchHit, SearchResults, SearchService, TavilyClient};
pub use selection::{AvailableTools, SearchQuery, ToolSelection, WeatherQuery};
pub use weather::{OpenWeatherClient, WeatherService};

/// Which auxiliary tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Search,
    Weather,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Search => "search",
            Self::Weather => "weather",
        };
        f.write_str(s)
    }
}

/// Failure of a single tool call. Never aborts a plan request.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed payload: {0}")]
    InvalidPayload(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ToolError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }
}

/// Turn a non-success HTTP response into a [`ToolError`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    Err(ToolError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Read a non-blank API key or fail with a configuration error.
pub(crate) fn require_key(key: Option<&str>, env: &str) -> Result<String, ToolError> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::Configuration(format!("no API key; set {env}")))
}
