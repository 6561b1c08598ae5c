//! The two-pass plan composer.
//!
//! One request runs pass 1 (tool selection), the selected tools in parallel,
//! then pass 2 (plan generation), and returns a validated body. Nothing is
//! persisted here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info};

use dayplan_db::models::PlanBody;

use super::extract::extract_json_object;
use super::prompt::{generation_prompt, selection_prompt};
use super::schema::validate_plan;
use crate::config::Timeouts;
use crate::error::{PlanError, Service, Stage};
use crate::llm::{LanguageModel, LlmError};
use crate::observe::{ComposeEvent, Observer, TracingObserver};
use crate::tools::{SearchService, ToolInvoker, ToolSelection, WeatherService};
use crate::validate::{resolve_start_date, validate_goal};

/// A validated composition request. Only constructible through [`ComposeRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    goal: String,
    start_date: NaiveDate,
    today: NaiveDate,
}

impl ComposeRequest {
    /// Validate the goal and resolve the start date against `today`.
    pub fn new(goal: &str, start_date: Option<&str>, today: NaiveDate) -> Result<Self, PlanError> {
        Ok(Self {
            goal: validate_goal(goal)?,
            start_date: resolve_start_date(start_date, today)?,
            today,
        })
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }
}

/// Output of a successful composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPlan {
    pub body: PlanBody,
    pub warnings: Vec<String>,
    pub tools_used: Vec<String>,
}

pub struct PlanComposer {
    model: Arc<dyn LanguageModel>,
    tools: ToolInvoker,
    observer: Arc<dyn Observer>,
    timeouts: Timeouts,
}

impl PlanComposer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let timeouts = Timeouts::default();
        Self {
            model,
            tools: ToolInvoker::new(timeouts.tool),
            observer: Arc::new(TracingObserver::new()),
            timeouts,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchService>) -> Self {
        self.tools = self.tools.with_search(search);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherService>) -> Self {
        self.tools = self.tools.with_weather(weather);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.tools = self.tools.with_timeout(timeouts.tool);
        self.timeouts = timeouts;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn has_search(&self) -> bool {
        self.tools.available().search
    }

    pub fn has_weather(&self) -> bool {
        self.tools.available().weather
    }

    /// Run both passes and return a validated plan.
    pub async fn compose(&self, request: &ComposeRequest) -> Result<ComposedPlan, PlanError> {
        info!(goal = %request.goal, start_date = %request.start_date, "compose: starting");

        let selection = self.select_tools(request).await?;
        let results = self.tools.invoke(&selection, self.observer.as_ref()).await;

        let prompt = generation_prompt(&request.goal, request.start_date, &results);
        let text = self.call_model(Stage::PlanGeneration, &prompt).await?;

        let value = extract_json_object(&text)
            .ok_or_else(|| PlanError::invalid_plan("response", "model output contained no JSON object"))
            .inspect_err(|e| self.reject(e))?;
        let validated = validate_plan(&value).inspect_err(|e| self.reject(e))?;

        for warning in &validated.warnings {
            self.observer.record(&ComposeEvent::PlanWarning {
                message: warning.clone(),
            });
        }
        self.observer.record(&ComposeEvent::PlanGenerated {
            days: validated.body.daily_breakdown.len(),
            tasks: validated.body.task_count(),
        });

        Ok(ComposedPlan {
            body: validated.body,
            warnings: validated.warnings,
            tools_used: results.tools_used(),
        })
    }

    /// Pass 1. Skipped when no tool is configured.
    async fn select_tools(&self, request: &ComposeRequest) -> Result<ToolSelection, PlanError> {
        let available = self.tools.available();
        if !available.any() {
            debug!("select_tools: no tools configured, skipping");
            return Ok(ToolSelection::none());
        }

        let prompt = selection_prompt(&request.goal, request.today, request.start_date, available);
        let text = match self.complete_with_timeout(&prompt).await {
            Ok(text) => text,
            // A reply without usable text is treated like an unparseable one.
            Err(LlmError::InvalidResponse(reason)) => {
                self.observer.record(&ComposeEvent::SelectionFallback { reason });
                return Ok(ToolSelection::none());
            }
            Err(e) => return Err(external(Stage::ToolSelection, &e)),
        };

        let selection = match ToolSelection::parse(&text, available, request.start_date) {
            Some(selection) => selection,
            None => {
                self.observer.record(&ComposeEvent::SelectionFallback {
                    reason: "no JSON object in tool selection response".to_string(),
                });
                ToolSelection::none()
            }
        };
        self.observer.record(&ComposeEvent::ToolsSelected {
            search: selection.search.is_some(),
            weather: selection.weather.is_some(),
        });
        Ok(selection)
    }

    async fn call_model(&self, stage: Stage, prompt: &str) -> Result<String, PlanError> {
        self.complete_with_timeout(prompt)
            .await
            .map_err(|e| external(stage, &e))
    }

    async fn complete_with_timeout(&self, prompt: &str) -> Result<String, LlmError> {
        with_deadline(self.timeouts.model, self.model.complete(prompt)).await
    }

    fn reject(&self, err: &PlanError) {
        self.observer.record(&ComposeEvent::PlanRejected {
            field: err.field().unwrap_or("response").to_string(),
            message: err.to_string(),
        });
    }
}

async fn with_deadline<F>(deadline: Duration, call: F) -> Result<String, LlmError>
where
    F: Future<Output = Result<String, LlmError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(LlmError::Timeout(deadline)))
}

fn external(stage: Stage, err: &LlmError) -> PlanError {
    PlanError::ExternalService {
        stage,
        service: Service::LanguageModel,
        message: err.to_string(),
    }
}
