//! Error taxonomy for plan requests.
//!
//! Every failure surfaced to a caller is a [`PlanError`] carrying the
//! [`Stage`] that produced it. Auxiliary tool failures never become a
//! `PlanError`; they are absorbed by the tool invoker.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The step of a plan request that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    ToolSelection,
    ToolInvocation,
    PlanGeneration,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::ToolSelection => "tool_selection",
            Self::ToolInvocation => "tool_invocation",
            Self::PlanGeneration => "plan_generation",
            Self::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

/// External collaborator that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    LanguageModel,
    Search,
    Weather,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LanguageModel => "language_model",
            Self::Search => "search",
            Self::Weather => "weather",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid {field}: {message}")]
    Validation {
        stage: Stage,
        field: String,
        message: String,
    },

    #[error("{service} failed during {stage}: {message}")]
    ExternalService {
        stage: Stage,
        service: Service,
        message: String,
    },

    #[error("database error while trying to {operation}: {source:#}")]
    Database {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("plan {id} not found")]
    NotFound { id: i64 },
}

impl PlanError {
    /// Bad user input, rejected before any external call.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            stage: Stage::Input,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Model output that could not be turned into a valid plan.
    pub fn invalid_plan(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            stage: Stage::PlanGeneration,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Database { operation, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation { stage, .. } | Self::ExternalService { stage, .. } => *stage,
            Self::Database { .. } | Self::NotFound { .. } => Stage::Persistence,
        }
    }

    /// Stable machine-readable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::NotFound { .. } => "PLAN_NOT_FOUND",
        }
    }

    /// Offending field, for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn service(&self) -> Option<Service> {
        match self {
            Self::ExternalService { service, .. } => Some(*service),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err = PlanError::invalid_plan("daily_breakdown[0].tasks[1].priority", "expected low, medium, or high");
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.stage(), Stage::PlanGeneration);
        assert_eq!(err.field(), Some("daily_breakdown[0].tasks[1].priority"));
        assert!(err.to_string().contains("daily_breakdown[0].tasks[1].priority"));
    }

    #[test]
    fn external_service_error_identifies_stage() {
        let err = PlanError::ExternalService {
            stage: Stage::ToolSelection,
            service: Service::LanguageModel,
            message: "timed out after 30s".to_string(),
        };
        assert_eq!(err.code(), "EXTERNAL_SERVICE_ERROR");
        assert_eq!(err.service(), Some(Service::LanguageModel));
        assert_eq!(
            err.to_string(),
            "language_model failed during tool_selection: timed out after 30s"
        );
    }

    #[test]
    fn database_and_not_found_are_persistence_stage() {
        let db = PlanError::database("save plan", anyhow::anyhow!("connection refused"));
        assert_eq!(db.stage(), Stage::Persistence);
        assert!(db.to_string().contains("connection refused"));

        let missing = PlanError::NotFound { id: 7 };
        assert_eq!(missing.code(), "PLAN_NOT_FOUND");
        assert_eq!(missing.to_string(), "plan 7 not found");
    }

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(Stage::PlanGeneration).unwrap(),
            serde_json::json!("plan_generation")
        );
    }
}
