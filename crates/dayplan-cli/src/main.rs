mod config;
mod plan_cmds;
mod serve_cmd;
mod services;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use dayplan_core::observe::TracingObserver;
use dayplan_core::plan::{MemoryPlanStore, PgPlanStore, PlanStore};
use dayplan_db::pool;

use config::DayplanConfig;

#[derive(Parser)]
#[command(name = "dayplan", about = "Turn a goal into a day-by-day plan")]
struct Cli {
    /// Database URL (overrides DAYPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a dayplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/dayplan")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the dayplan database (requires config file or env vars)
    DbInit,
    /// Start the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
        /// Keep plans in memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Compose a plan for a goal
    Create {
        /// What you want to achieve
        goal: String,
        /// First day of the plan, YYYY-MM-DD (defaults to tomorrow)
        #[arg(long)]
        start_date: Option<String>,
        /// Print the plan without saving it (no database required)
        #[arg(long)]
        no_save: bool,
    },
    /// Show a plan (omit the ID to list recent plans)
    Show {
        /// Plan ID to show
        plan_id: Option<i64>,
    },
    /// List saved plans
    List {
        /// Maximum number of plans to list
        #[arg(long)]
        limit: Option<i64>,
        /// Only plans whose goal contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Delete a plan
    Delete {
        /// Plan ID to delete
        plan_id: i64,
    },
}

/// Execute the `dayplan init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        llm: Default::default(),
        search: Default::default(),
        weather: Default::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  llm.provider = {}", cfg.llm.provider);
    println!();
    println!("API keys are read from GEMINI_API_KEY (or OPENAI_API_KEY), TAVILY_API_KEY,");
    println!("and OPENWEATHER_API_KEY, or from api_key entries added to the file.");
    println!();
    println!("Next: run `dayplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `dayplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = DayplanConfig::resolve(cli_db_url)?;

    println!("Initializing dayplan database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let count = pool::plan_count(&db_pool).await?;
    println!("Database ready. plans: {count} rows");

    db_pool.close().await;

    println!("dayplan db-init complete.");
    Ok(())
}

/// Execute the `dayplan serve` command.
async fn cmd_serve(cli_db_url: Option<&str>, bind: &str, port: u16, in_memory: bool) -> anyhow::Result<()> {
    let resolved = DayplanConfig::resolve(cli_db_url)?;

    let observer = TracingObserver::new();
    let stats = observer.stats();
    let composer = services::build_composer(&resolved, Arc::new(observer))?;

    let db_pool = if in_memory {
        None
    } else {
        Some(pool::create_pool(&resolved.db_config).await?)
    };
    let store: Arc<dyn PlanStore> = match &db_pool {
        Some(p) => Arc::new(PgPlanStore::new(p.clone())),
        None => Arc::new(MemoryPlanStore::new()),
    };

    let state = serve_cmd::AppState {
        store,
        composer: Arc::new(composer),
        stats,
        today: serve_cmd::local_today,
    };
    let result = serve_cmd::run_serve(state, bind, port).await;

    if let Some(p) = db_pool {
        p.close().await;
    }
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve {
            bind,
            port,
            in_memory,
        } => {
            cmd_serve(cli.database_url.as_deref(), &bind, port, in_memory).await?;
        }
        Commands::Plan { command } => {
            let resolved = DayplanConfig::resolve(cli.database_url.as_deref())?;
            let today = serve_cmd::local_today();

            // `plan create --no-save` never touches the database.
            if let PlanCommands::Create { no_save: true, .. } = &command {
                let store = MemoryPlanStore::new();
                plan_cmds::run_plan_command(command, &store, &resolved, today).await?;
                return Ok(());
            }

            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let store = PgPlanStore::new(db_pool.clone());
            let result = plan_cmds::run_plan_command(command, &store, &resolved, today).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
