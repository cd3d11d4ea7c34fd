//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Persistent plugin state
//! - Adapters: Platform integrations (console)

pub mod config;
pub mod storage;
pub mod adapters;
