use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use dayplan_core::observe::ComposeStats;
use dayplan_core::plan::{self, CreatePlanRequest, PlanComposer, PlanStore, format_plan};
use dayplan_core::{PlanError, Service, Stage};
use dayplan_db::models::{PlanBody, PlanSummary};

/// Plans shown on the HTML index.
const INDEX_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlanStore>,
    pub composer: Arc<PlanComposer>,
    pub stats: Arc<ComposeStats>,
    /// Source of "today" for start-date validation.
    pub today: fn() -> NaiveDate,
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    stage: Stage,
    field: Option<String>,
    service: Option<Service>,
}

impl AppError {
    /// Malformed request that never reached the plan service.
    pub fn bad_request(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
            stage: Stage::Input,
            field: Some(field.into()),
            service: None,
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        let status = match &err {
            PlanError::Validation { .. } => StatusCode::BAD_REQUEST,
            PlanError::NotFound { .. } => StatusCode::NOT_FOUND,
            PlanError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            PlanError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(code = err.code(), stage = %err.stage(), "{err:#}");
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
            stage: err.stage(),
            field: err.field().map(str::to_string),
            service: err.service(),
        }
    }
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
    stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<Service>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let detail = ErrorDetail {
            code: self.code,
            message: &self.message,
            stage: self.stage,
            field: self.field.as_deref(),
            service: self.service,
        };
        let body = serde_json::json!({ "success": false, "error": detail });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePlanBody {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default = "default_save")]
    pub save_to_db: bool,
}

fn default_save() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CreatePlanResponse {
    pub success: bool,
    pub message: String,
    pub plan_id: Option<i64>,
    pub start_date: NaiveDate,
    pub plan_data: PlanBody,
    pub formatted_plan: String,
    pub warnings: Vec<String>,
    pub tools_used: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    pub success: bool,
    pub message: String,
    pub plans: Vec<PlanSummary>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanDetailResponse {
    pub success: bool,
    pub plan_id: i64,
    pub goal: String,
    pub plan_data: PlanBody,
    pub formatted_plan: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub database: String,
    pub language_model: String,
    pub search: &'static str,
    pub weather: &'static str,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/plans", get(list_plans).post(create_plan))
        .route("/api/plans/{id}", get(get_plan).delete(delete_plan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let backend = state.store.backend();
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!(store = backend, "dayplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dayplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<AppState>) -> Result<axum::response::Response, AppError> {
    let plans = state.store.list(Some(INDEX_LIMIT), None).await?;

    let rows = if plans.is_empty() {
        "<tr><td colspan=\"3\">No plans yet.</td></tr>".to_string()
    } else {
        plans
            .iter()
            .map(|p| {
                format!(
                    "<tr><td><a href=\"/api/plans/{id}\">{id}</a></td><td>{goal}</td><td>{days}</td></tr>",
                    id = p.id,
                    goal = escape_html(&p.goal),
                    days = p.day_count,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let html = format!(
        "<!DOCTYPE html>\
<html><head><title>dayplan</title></head><body>\
<h1>dayplan</h1>\
<p><a href=\"/api/plans\">/api/plans</a> | <a href=\"/health\">/health</a></p>\
<table><tr><th>ID</th><th>Goal</th><th>Days</th></tr>{rows}</table>\
</body></html>"
    );

    Ok(Html(html).into_response())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

async fn health(State(state): State<AppState>) -> axum::response::Response {
    let (status, database) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, format!("healthy ({})", state.store.backend())),
        Err(e) => {
            error!("health: store ping failed: {e:#}");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy".to_string())
        }
    };

    let services = ServiceStatus {
        database,
        language_model: state.composer.model_name().to_string(),
        search: configured(state.composer.has_search()),
        weather: configured(state.composer.has_weather()),
    };
    let overall = if status == StatusCode::OK { "healthy" } else { "unhealthy" };
    let body = serde_json::json!({
        "status": overall,
        "services": services,
        "stats": state.stats.snapshot(),
    });
    (status, Json(body)).into_response()
}

fn configured(enabled: bool) -> &'static str {
    if enabled { "configured" } else { "not_configured" }
}

async fn create_plan(
    State(state): State<AppState>,
    payload: Result<Json<CreatePlanBody>, JsonRejection>,
) -> Result<axum::response::Response, AppError> {
    let Json(body) = payload.map_err(|e| AppError::bad_request("body", e.body_text()))?;

    let request = CreatePlanRequest {
        goal: body.goal,
        start_date: body.start_date,
        save: body.save_to_db,
    };
    let created = plan::create_plan(&state.composer, state.store.as_ref(), &request, (state.today)()).await?;

    let message = match created.plan_id {
        Some(id) => format!("Plan created and saved with ID {id}"),
        None => "Plan created (not saved)".to_string(),
    };
    Ok(Json(CreatePlanResponse {
        success: true,
        message,
        plan_id: created.plan_id,
        start_date: created.start_date,
        formatted_plan: format_plan(&created.body),
        plan_data: created.body,
        warnings: created.warnings,
        tools_used: created.tools_used,
    })
    .into_response())
}

async fn list_plans(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<axum::response::Response, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request("query", e.body_text()))?;

    let plans = plan::list_plans(state.store.as_ref(), params.limit, params.search.as_deref()).await?;
    let total_count = plans.len();
    Ok(Json(ListPlansResponse {
        success: true,
        message: format!("Found {total_count} plan(s)"),
        plans,
        total_count,
    })
    .into_response())
}

async fn get_plan(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<axum::response::Response, AppError> {
    let Path(id) = id.map_err(|e| AppError::bad_request("plan_id", e.body_text()))?;

    let stored = plan::get_plan(state.store.as_ref(), id).await?;
    Ok(Json(PlanDetailResponse {
        success: true,
        plan_id: stored.id,
        goal: stored.goal,
        formatted_plan: format_plan(&stored.body),
        plan_data: stored.body,
        created_at: stored.created_at,
    })
    .into_response())
}

async fn delete_plan(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<axum::response::Response, AppError> {
    let Path(id) = id.map_err(|e| AppError::bad_request("plan_id", e.body_text()))?;

    plan::delete_plan(state.store.as_ref(), id).await?;
    let body = serde_json::json!({
        "success": true,
        "message": format!("Plan {id} deleted"),
    });
    Ok(Json(body).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
