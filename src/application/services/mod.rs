//! Application services - Business logic orchestration

pub mod input_collector;
pub mod permission_service;

pub use input_collector::{Answer, InputCollector, QueryOptions, QueryOutcome};
pub use permission_service::PermissionResolver;
