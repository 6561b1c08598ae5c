//! Resolved service settings for the model, search, and weather clients.
//!
//! These are plain values; the CLI resolves them from flags, environment
//! variables, and the config file before building clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Language model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `gemini` or `openai`.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Resolved API key; never written back to the config file by us.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Retries for transient failures. Capped at [`LlmConfig::MAX_RETRIES_CAP`].
    pub max_retries: u32,
}

impl LlmConfig {
    pub const MAX_RETRIES_CAP: u32 = 3;

    /// Longest wait between two attempts, including server-requested waits.
    pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(10);

    /// Deadline for a single request to the provider.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn effective_retries(&self) -> u32 {
        self.max_retries.min(Self::MAX_RETRIES_CAP)
    }

    /// Upper bound on one `complete` call: every attempt at its own deadline
    /// plus the longest wait before each retry.
    pub fn call_budget(&self) -> Duration {
        let retries = self.effective_retries();
        self.timeout() * (retries + 1) + Self::MAX_RETRY_WAIT * retries
    }

    /// Default base URL and model for a provider name.
    pub fn provider_defaults(provider: &str) -> Option<(&'static str, &'static str)> {
        match provider {
            "gemini" => Some(("https://generativelanguage.googleapis.com", "gemini-1.5-flash")),
            "openai" => Some(("https://api.openai.com", "gpt-4o-mini")),
            _ => None,
        }
    }

    /// Environment variable holding the API key for a provider.
    pub fn api_key_env(provider: &str) -> &'static str {
        match provider {
            "openai" => "OPENAI_API_KEY",
            _ => "GEMINI_API_KEY",
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

/// Web search (Tavily) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_results: u32,
}

impl SearchConfig {
    pub const API_KEY_ENV: &str = "TAVILY_API_KEY";

    /// Whether a non-blank key is configured.
    pub fn has_api_key(&self) -> bool {
        has_key(self.api_key.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            timeout_secs: 10,
            max_results: 5,
        }
    }
}

/// Weather (OpenWeatherMap) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl WeatherConfig {
    pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

    /// Whether a non-blank key is configured.
    pub fn has_api_key(&self) -> bool {
        has_key(self.api_key.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

fn has_key(key: Option<&str>) -> bool {
    key.is_some_and(|k| !k.trim().is_empty())
}

/// Per-call deadlines enforced by the composer around every external call.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub model: Duration,
    pub tool: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            model: Duration::from_secs(60),
            tool: Duration::from_secs(10),
        }
    }
}
