//! CLI handlers for `dayplan plan` subcommands.
//!
//! Implements:
//! - `dayplan plan create <goal>` -- compose a plan and (by default) save it
//! - `dayplan plan show [id]`     -- show one plan, or list recent plans
//! - `dayplan plan list`          -- list plans with optional limit and search
//! - `dayplan plan delete <id>`   -- delete a plan

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use dayplan_core::observe::TracingObserver;
use dayplan_core::plan::{self, CreatePlanRequest, PlanStore, format_plan};
use dayplan_db::models::PlanSummary;

use crate::PlanCommands;
use crate::config::DayplanConfig;
use crate::services::build_composer;

/// Rows shown by `plan show` without an ID.
const RECENT_LIMIT: i64 = 20;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    store: &dyn PlanStore,
    config: &DayplanConfig,
    today: NaiveDate,
) -> Result<()> {
    match command {
        PlanCommands::Create {
            goal,
            start_date,
            no_save,
        } => {
            let request = CreatePlanRequest {
                goal,
                start_date,
                save: !no_save,
            };
            cmd_create(store, config, &request, today).await
        }
        PlanCommands::Show { plan_id } => match plan_id {
            Some(id) => cmd_show_one(store, id).await,
            None => cmd_list(store, Some(RECENT_LIMIT), None).await,
        },
        PlanCommands::List { limit, search } => cmd_list(store, limit, search.as_deref()).await,
        PlanCommands::Delete { plan_id } => cmd_delete(store, plan_id).await,
    }
}

// -----------------------------------------------------------------------
// dayplan plan create <goal>
// -----------------------------------------------------------------------

async fn cmd_create(
    store: &dyn PlanStore,
    config: &DayplanConfig,
    request: &CreatePlanRequest,
    today: NaiveDate,
) -> Result<()> {
    let composer = build_composer(config, Arc::new(TracingObserver::new()))?;
    let created = plan::create_plan(&composer, store, request, today).await?;

    println!("{}", format_plan(&created.body));
    println!();
    match created.plan_id {
        Some(id) => println!("Plan saved with ID {id}."),
        None => println!("Plan not saved (--no-save)."),
    }
    println!("  Start date: {}", created.start_date);
    if created.tools_used.is_empty() {
        println!("  Tools used: none");
    } else {
        println!("  Tools used: {}", created.tools_used.join(", "));
    }

    if !created.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &created.warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------
// dayplan plan show <id>
// -----------------------------------------------------------------------

async fn cmd_show_one(store: &dyn PlanStore, id: i64) -> Result<()> {
    let stored = plan::get_plan(store, id).await?;

    println!("Plan {}", stored.id);
    println!("  Created: {}", stored.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("{}", format_plan(&stored.body));

    Ok(())
}

// -----------------------------------------------------------------------
// dayplan plan list
// -----------------------------------------------------------------------

async fn cmd_list(store: &dyn PlanStore, limit: Option<i64>, search: Option<&str>) -> Result<()> {
    let plans = plan::list_plans(store, limit, search).await?;

    if plans.is_empty() {
        println!("No plans found. Use `dayplan plan create <goal>` to create one.");
        return Ok(());
    }

    print!("{}", render_table(&plans));
    println!();
    println!("{} plan(s)", plans.len());
    Ok(())
}

/// Widest goal column before truncation.
const GOAL_MAX_WIDTH: usize = 48;

fn render_table(plans: &[PlanSummary]) -> String {
    let id_w = plans
        .iter()
        .map(|p| p.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    let goal_w = plans
        .iter()
        .map(|p| p.goal.chars().count().min(GOAL_MAX_WIDTH))
        .max()
        .unwrap_or(4)
        .max(4);
    let days_w = 4;
    let created_w = 16;

    let mut out = String::new();
    out.push_str(&format!(
        "{:<id_w$}  {:<goal_w$}  {:>days_w$}  {:<created_w$}\n",
        "ID", "GOAL", "DAYS", "CREATED",
    ));
    out.push_str(&format!(
        "{:-<id_w$}  {:-<goal_w$}  {:->days_w$}  {:-<created_w$}\n",
        "", "", "", "",
    ));
    for p in plans {
        out.push_str(&format!(
            "{:<id_w$}  {:<goal_w$}  {:>days_w$}  {:<created_w$}\n",
            p.id,
            truncate(&p.goal, GOAL_MAX_WIDTH),
            p.day_count,
            p.created_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

// -----------------------------------------------------------------------
// dayplan plan delete <id>
// -----------------------------------------------------------------------

async fn cmd_delete(store: &dyn PlanStore, id: i64) -> Result<()> {
    plan::delete_plan(store, id).await?;
    println!("Plan {id} deleted.");
    Ok(())
}
