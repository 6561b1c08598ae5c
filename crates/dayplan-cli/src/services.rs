//! Build the plan composer from resolved configuration.
//!
//! The model client is required. Search and weather are wired in only when
//! their API keys are present and non-blank; an unconfigured tool is never
//! offered to the model.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use dayplan_core::llm;
use dayplan_core::observe::Observer;
use dayplan_core::plan::PlanComposer;
use dayplan_core::tools::{OpenWeatherClient, TavilyClient};

use crate::config::DayplanConfig;

pub fn build_composer(config: &DayplanConfig, observer: Arc<dyn Observer>) -> Result<PlanComposer> {
    let model = llm::create_client(&config.llm)
        .with_context(|| format!("failed to configure {} language model", config.llm.provider))?;

    let mut composer = PlanComposer::new(model)
        .with_observer(observer)
        .with_timeouts(config.timeouts());

    if config.search.has_api_key() {
        let client = TavilyClient::from_config(&config.search).context("failed to configure search client")?;
        composer = composer.with_search(Arc::new(client));
    } else {
        warn!("TAVILY_API_KEY not set; web search disabled");
    }

    if config.weather.has_api_key() {
        let client =
            OpenWeatherClient::from_config(&config.weather).context("failed to configure weather client")?;
        composer = composer.with_weather(Arc::new(client));
    } else {
        warn!("OPENWEATHER_API_KEY not set; weather forecasts disabled");
    }

    info!(
        model = composer.model_name(),
        search = composer.has_search(),
        weather = composer.has_weather(),
        "plan composer ready"
    );
    Ok(composer)
}
