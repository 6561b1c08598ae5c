//! Persistence layer for dayplan: connection config, pool, migrations, and
//! queries against the `plans` table.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
