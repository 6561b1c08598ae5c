pub mod config;
pub mod error;
pub mod llm;
pub mod observe;
pub mod plan;
pub mod tools;
pub mod validate;

pub use error::{PlanError, Service, Stage};
