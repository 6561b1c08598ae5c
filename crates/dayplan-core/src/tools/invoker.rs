//! Concurrent tool invocation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{AvailableTools, SearchService, Tool, ToolError, ToolSelection, WeatherService};
use crate::observe::{ComposeEvent, Observer};

/// Rendered tool output for the generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResults {
    pub search: Option<String>,
    pub weather: Option<String>,
}

impl ToolResults {
    /// Names of tools that contributed output.
    pub fn tools_used(&self) -> Vec<String> {
        let mut used = Vec::new();
        if self.search.is_some() {
            used.push(Tool::Search.to_string());
        }
        if self.weather.is_some() {
            used.push(Tool::Weather.to_string());
        }
        used
    }
}

/// Runs the selected tools side by side, each under its own deadline.
#[derive(Clone)]
pub struct ToolInvoker {
    search: Option<Arc<dyn SearchService>>,
    weather: Option<Arc<dyn WeatherService>>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            search: None,
            weather: None,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchService>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherService>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn available(&self) -> AvailableTools {
        AvailableTools {
            search: self.search.is_some(),
            weather: self.weather.is_some(),
        }
    }

    /// Invoke every selected tool. Failures are reported and dropped.
    pub async fn invoke(&self, selection: &ToolSelection, observer: &dyn Observer) -> ToolResults {
        if selection.is_empty() {
            debug!("invoke: no tools selected");
            return ToolResults::default();
        }

        let search = async {
            match (&selection.search, &self.search) {
                (Some(q), Some(service)) => {
                    let call = async { service.search(&q.query).await.map(|r| r.render()) };
                    let outcome = self.run(Tool::Search, call).await;
                    Some(outcome)
                }
                _ => None,
            }
        };
        let weather = async {
            match (&selection.weather, &self.weather) {
                (Some(q), Some(service)) => {
                    let outcome = self.run(Tool::Weather, service.forecast(&q.location, q.date)).await;
                    Some(outcome)
                }
                _ => None,
            }
        };

        let (search, weather) = tokio::join!(search, weather);

        ToolResults {
            search: search.and_then(|o| report(observer, Tool::Search, o)),
            weather: weather.and_then(|o| report(observer, Tool::Weather, o)),
        }
    }

    async fn run<F>(&self, tool: Tool, call: F) -> (Duration, Result<String, ToolError>)
    where
        F: Future<Output = Result<String, ToolError>>,
    {
        debug!(%tool, "invoke: calling tool");
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout)),
        };
        (started.elapsed(), result)
    }
}

fn report(
    observer: &dyn Observer,
    tool: Tool,
    (elapsed, result): (Duration, Result<String, ToolError>),
) -> Option<String> {
    match result {
        Ok(text) => {
            observer.record(&ComposeEvent::ToolSucceeded { tool, elapsed });
            Some(text)
        }
        Err(e) => {
            observer.record(&ComposeEvent::ToolFailed {
                tool,
                error: e.to_string(),
            });
            None
        }
    }
}
