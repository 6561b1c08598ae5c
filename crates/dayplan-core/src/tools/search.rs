//! Web search via Tavily.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ToolError, check_status, require_key};
use crate::config::SearchConfig;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Direct answer, when the provider offers one.
    pub answer: Option<String>,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    /// Render as prompt context.
    pub fn render(&self) -> String {
        if self.hits.is_empty() && self.answer.is_none() {
            return "No search results found.".to_string();
        }

        let mut out = String::new();
        if let Some(answer) = &self.answer {
            let _ = writeln!(out, "Answer: {answer}\n");
        }
        for (i, hit) in self.hits.iter().enumerate() {
            let _ = writeln!(out, "{}. {}\n   URL: {}\n   Content: {}", i + 1, hit.title, hit.url, hit.snippet);
        }
        out.trim_end().to_string()
    }
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResults, ToolError>;
}

pub struct TavilyClient {
    api_key: String,
    base_url: String,
    max_results: u32,
    http: Client,
    timeout: Duration,
}

impl TavilyClient {
    pub fn from_config(config: &SearchConfig) -> Result<Self, ToolError> {
        let api_key = require_key(config.api_key.as_deref(), SearchConfig::API_KEY_ENV)?;
        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build().map_err(ToolError::Network)?;
        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            http,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchService for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchResults, ToolError> {
        debug!(query, "search: called");
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query.trim(),
            "search_depth": "basic",
            "include_answer": true,
            "include_raw_content": false,
            "max_results": self.max_results,
        });

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.timeout))?;
        let response = check_status(response).await?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidPayload(e.to_string()))?;

        let hits = parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                snippet: r.content,
                url: r.url,
            })
            .collect::<Vec<_>>();
        debug!(hits = hits.len(), "search: success");

        Ok(SearchResults {
            answer: parsed.answer.filter(|a| !a.trim().is_empty()),
            hits,
        })
    }
}
