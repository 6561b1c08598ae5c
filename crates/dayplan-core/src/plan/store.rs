//! Plan persistence behind a trait.
//!
//! [`PgPlanStore`] is the production backend. [`MemoryPlanStore`] backs
//! `serve --in-memory` and tests that do not need PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;

use dayplan_db::models::{Plan, PlanBody, PlanSummary};
use dayplan_db::pool;
use dayplan_db::queries::plans as plan_queries;

use crate::error::PlanError;

#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Backend name, for health output.
    fn backend(&self) -> &'static str;

    /// Persist a validated body and return the new plan's ID.
    async fn save(&self, goal: &str, body: &PlanBody) -> Result<i64, PlanError>;

    async fn get(&self, id: i64) -> Result<Plan, PlanError>;

    /// Newest first, optionally filtered by a case-insensitive substring of the goal.
    async fn list(&self, limit: Option<i64>, search: Option<&str>) -> Result<Vec<PlanSummary>, PlanError>;

    async fn delete(&self, id: i64) -> Result<(), PlanError>;

    async fn ping(&self) -> Result<(), PlanError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    async fn save(&self, goal: &str, body: &PlanBody) -> Result<i64, PlanError> {
        let plan = plan_queries::insert_plan(&self.pool, goal, body)
            .await
            .map_err(|e| PlanError::database("save plan", e))?;
        Ok(plan.id)
    }

    async fn get(&self, id: i64) -> Result<Plan, PlanError> {
        plan_queries::get_plan(&self.pool, id)
            .await
            .map_err(|e| PlanError::database("load plan", e))?
            .ok_or(PlanError::NotFound { id })
    }

    async fn list(&self, limit: Option<i64>, search: Option<&str>) -> Result<Vec<PlanSummary>, PlanError> {
        plan_queries::list_plans(&self.pool, limit, search)
            .await
            .map_err(|e| PlanError::database("list plans", e))
    }

    async fn delete(&self, id: i64) -> Result<(), PlanError> {
        let deleted = plan_queries::delete_plan(&self.pool, id)
            .await
            .map_err(|e| PlanError::database("delete plan", e))?;
        if deleted { Ok(()) } else { Err(PlanError::NotFound { id }) }
    }

    async fn ping(&self) -> Result<(), PlanError> {
        pool::ping(&self.pool)
            .await
            .map_err(|e| PlanError::database("reach database", e))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    plans: Vec<Plan>,
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    state: Mutex<MemoryState>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn save(&self, goal: &str, body: &PlanBody) -> Result<i64, PlanError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        state.plans.push(Plan {
            id,
            goal: goal.to_string(),
            body: body.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Plan, PlanError> {
        let state = self.state.lock().await;
        state
            .plans
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(PlanError::NotFound { id })
    }

    async fn list(&self, limit: Option<i64>, search: Option<&str>) -> Result<Vec<PlanSummary>, PlanError> {
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);

        let mut matches: Vec<&Plan> = state
            .plans
            .iter()
            .filter(|p| match &needle {
                Some(n) => p.goal.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let limit = limit.map_or(usize::MAX, |n| usize::try_from(n.max(0)).unwrap_or(usize::MAX));
        Ok(matches.into_iter().take(limit).map(PlanSummary::from).collect())
    }

    async fn delete(&self, id: i64) -> Result<(), PlanError> {
        let mut state = self.state.lock().await;
        let before = state.plans.len();
        state.plans.retain(|p| p.id != id);
        if state.plans.len() < before {
            Ok(())
        } else {
            Err(PlanError::NotFound { id })
        }
    }

    async fn ping(&self) -> Result<(), PlanError> {
        Ok(())
    }
}
