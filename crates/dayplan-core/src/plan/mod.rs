//! Plan composition, validation, storage, and the service layer.

pub mod composer;
pub mod extract;
pub mod format;
pub mod prompt;
pub mod schema;
pub mod service;
pub mod store;

pub use composer::{ComposeRequest, ComposedPlan, PlanComposer};
pub use format::format_plan;
pub use service::{CreatePlanRequest, CreatedPlan, create_plan, delete_plan, get_plan, list_plans};
pub use store::{MemoryPlanStore, PgPlanStore, PlanStore};
