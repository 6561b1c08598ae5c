use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Priority of a single task within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(PriorityParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone)]
pub struct PriorityParseError(pub String);

impl fmt::Display for PriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid priority: {:?} (expected low, medium, or high)", self.0)
    }
}

impl std::error::Error for PriorityParseError {}

// ---------------------------------------------------------------------------
// Plan document
// ---------------------------------------------------------------------------

/// The structured plan document stored in `plans.body`.
///
/// Only bodies that passed schema validation are ever constructed from model
/// output, so every value of this type is safe to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanBody {
    pub goal: String,
    pub overview: String,
    pub estimated_duration: String,
    /// Kept in the order the model emitted it.
    pub daily_breakdown: Vec<DayEntry>,
    pub success_metrics: Vec<String>,
    pub potential_challenges: Vec<String>,
}

/// One day of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEntry {
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub focus: String,
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub research_topics: Vec<String>,
    #[serde(default)]
    pub weather_relevant: bool,
}

/// A task within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    /// Task description.
    pub task: String,
    pub estimated_time: String,
    pub priority: Priority,
    /// Task descriptions or 1-based task indices within the same plan.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PlanBody {
    /// Total number of tasks across all days.
    pub fn task_count(&self) -> usize {
        self.daily_breakdown.iter().map(|d| d.tasks.len()).sum()
    }

    /// Iterate over every task in narrative order.
    pub fn tasks(&self) -> impl Iterator<Item = &PlanTask> {
        self.daily_breakdown.iter().flat_map(|d| d.tasks.iter())
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A stored plan row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    /// The goal as submitted by the user.
    pub goal: String,
    #[sqlx(json)]
    pub body: PlanBody,
    pub created_at: DateTime<Utc>,
}

/// Lightweight listing row for `list_plans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanSummary {
    pub id: i64,
    pub goal: String,
    pub overview: String,
    pub estimated_duration: String,
    pub day_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id,
            goal: plan.goal.clone(),
            overview: plan.body.overview.clone(),
            estimated_duration: plan.body.estimated_duration.clone(),
            day_count: plan.body.daily_breakdown.len() as i64,
            created_at: plan.created_at,
        }
    }
}
