//! Plan service layer.
//!
//! Validates requests, drives the composer, and talks to the store. Both the
//! HTTP server and the CLI go through these functions.

use chrono::NaiveDate;
use tracing::info;

use dayplan_db::models::{Plan, PlanBody, PlanSummary};

use super::composer::{ComposeRequest, PlanComposer};
use super::store::PlanStore;
use crate::error::PlanError;
use crate::validate::{validate_limit, validate_plan_id, validate_search_term};

#[derive(Debug, Clone)]
pub struct CreatePlanRequest {
    pub goal: String,
    pub start_date: Option<String>,
    /// Persist the plan. Defaults to true at the API surface.
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPlan {
    /// `None` when the caller asked not to save.
    pub plan_id: Option<i64>,
    pub start_date: NaiveDate,
    pub body: PlanBody,
    pub warnings: Vec<String>,
    pub tools_used: Vec<String>,
}

/// Validate, compose, and optionally save a plan.
///
/// Input is validated before any external call. A body is only written once
/// it has passed validation, so a failure at any stage leaves no row behind.
pub async fn create_plan(
    composer: &PlanComposer,
    store: &dyn PlanStore,
    request: &CreatePlanRequest,
    today: NaiveDate,
) -> Result<CreatedPlan, PlanError> {
    let compose_request = ComposeRequest::new(&request.goal, request.start_date.as_deref(), today)?;
    let composed = composer.compose(&compose_request).await?;

    let plan_id = if request.save {
        let id = store.save(compose_request.goal(), &composed.body).await?;
        info!(plan_id = id, "create_plan: saved");
        Some(id)
    } else {
        None
    };

    Ok(CreatedPlan {
        plan_id,
        start_date: compose_request.start_date(),
        body: composed.body,
        warnings: composed.warnings,
        tools_used: composed.tools_used,
    })
}

pub async fn get_plan(store: &dyn PlanStore, id: i64) -> Result<Plan, PlanError> {
    store.get(validate_plan_id(id)?).await
}

pub async fn list_plans(
    store: &dyn PlanStore,
    limit: Option<i64>,
    search: Option<&str>,
) -> Result<Vec<PlanSummary>, PlanError> {
    let limit = validate_limit(limit)?;
    let search = validate_search_term(search)?;
    store.list(limit, search.as_deref()).await
}

pub async fn delete_plan(store: &dyn PlanStore, id: i64) -> Result<(), PlanError> {
    store.delete(validate_plan_id(id)?).await?;
    info!(plan_id = id, "delete_plan: deleted");
    Ok(())
}
