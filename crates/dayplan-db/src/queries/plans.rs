//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::models::{Plan, PlanBody, PlanSummary};

/// Insert a new plan row. Returns the inserted plan with server-generated
/// defaults (id, created_at).
pub async fn insert_plan(pool: &PgPool, goal: &str, body: &PlanBody) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (goal, body) \
         VALUES ($1, $2) \
         RETURNING id, goal, body, created_at",
    )
    .bind(goal)
    .bind(Json(body))
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: i64) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT id, goal, body, created_at FROM plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch plan")?;

    Ok(plan)
}

/// List plan summaries, newest first.
///
/// `search` is a case-insensitive substring match against the goal text.
/// `limit = None` returns every matching row.
pub async fn list_plans(
    pool: &PgPool,
    limit: Option<i64>,
    search: Option<&str>,
) -> Result<Vec<PlanSummary>> {
    // strpos avoids having to escape LIKE wildcards in the search term.
    let plans = sqlx::query_as::<_, PlanSummary>(
        "SELECT id, goal, \
                COALESCE(body->>'overview', '') AS overview, \
                COALESCE(body->>'estimated_duration', '') AS estimated_duration, \
                COALESCE(jsonb_array_length(body->'daily_breakdown'), 0)::BIGINT AS day_count, \
                created_at \
         FROM plans \
         WHERE $1::TEXT IS NULL OR strpos(lower(goal), lower($1::TEXT)) > 0 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(search)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Delete a plan. Returns `false` when no row had that ID.
pub async fn delete_plan(pool: &PgPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete plan")?;

    Ok(result.rows_affected() > 0)
}
