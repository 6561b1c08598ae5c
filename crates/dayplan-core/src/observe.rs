//! Observation hooks for plan composition.
//!
//! The composer reports what happened through an injected [`Observer`].
//! [`TracingObserver`] logs each event and keeps process-wide counters that
//! the server exposes on its health endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Stage;
use crate::tools::Tool;

#[derive(Debug, Clone, PartialEq)]
pub enum ComposeEvent {
    ToolsSelected { search: bool, weather: bool },
    /// Pass-1 output could not be parsed; continuing without tools.
    SelectionFallback { reason: String },
    ToolSucceeded { tool: Tool, elapsed: Duration },
    ToolFailed { tool: Tool, error: String },
    /// Non-fatal anomaly in a validated plan.
    PlanWarning { message: String },
    PlanGenerated { days: usize, tasks: usize },
    PlanRejected { field: String, message: String },
}

impl ComposeEvent {
    /// The step of the request the event belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ToolsSelected { .. } | Self::SelectionFallback { .. } => Stage::ToolSelection,
            Self::ToolSucceeded { .. } | Self::ToolFailed { .. } => Stage::ToolInvocation,
            Self::PlanWarning { .. } | Self::PlanGenerated { .. } | Self::PlanRejected { .. } => {
                Stage::PlanGeneration
            }
        }
    }
}

pub trait Observer: Send + Sync {
    fn record(&self, event: &ComposeEvent);
}

/// Counters since process start.
#[derive(Debug, Default)]
pub struct ComposeStats {
    plans_generated: AtomicU64,
    plans_rejected: AtomicU64,
    tool_successes: AtomicU64,
    tool_failures: AtomicU64,
    selection_fallbacks: AtomicU64,
    plan_warnings: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub plans_generated: u64,
    pub plans_rejected: u64,
    pub tool_successes: u64,
    pub tool_failures: u64,
    pub selection_fallbacks: u64,
    pub plan_warnings: u64,
}

impl ComposeStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            plans_generated: self.plans_generated.load(Ordering::Relaxed),
            plans_rejected: self.plans_rejected.load(Ordering::Relaxed),
            tool_successes: self.tool_successes.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            selection_fallbacks: self.selection_fallbacks.load(Ordering::Relaxed),
            plan_warnings: self.plan_warnings.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Logs events with `tracing` and counts them.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    stats: Arc<ComposeStats>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<ComposeStats> {
        Arc::clone(&self.stats)
    }
}

impl Observer for TracingObserver {
    fn record(&self, event: &ComposeEvent) {
        let stage = event.stage();
        match event {
            ComposeEvent::ToolsSelected { search, weather } => {
                info!(%stage, search, weather, "tools selected");
            }
            ComposeEvent::SelectionFallback { reason } => {
                warn!(%stage, reason = %reason, "tool selection unparseable, continuing without tools");
                ComposeStats::bump(&self.stats.selection_fallbacks);
            }
            ComposeEvent::ToolSucceeded { tool, elapsed } => {
                info!(%stage, %tool, elapsed_ms = elapsed.as_millis() as u64, "tool call succeeded");
                ComposeStats::bump(&self.stats.tool_successes);
            }
            ComposeEvent::ToolFailed { tool, error } => {
                warn!(%stage, %tool, error = %error, "tool call failed, continuing without it");
                ComposeStats::bump(&self.stats.tool_failures);
            }
            ComposeEvent::PlanWarning { message } => {
                warn!(%stage, message = %message, "plan warning");
                ComposeStats::bump(&self.stats.plan_warnings);
            }
            ComposeEvent::PlanGenerated { days, tasks } => {
                info!(%stage, days, tasks, "plan generated");
                ComposeStats::bump(&self.stats.plans_generated);
            }
            ComposeEvent::PlanRejected { field, message } => {
                warn!(%stage, field = %field, message = %message, "model output rejected");
                ComposeStats::bump(&self.stats.plans_rejected);
            }
        }
    }
}
