//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Input collection and permission resolution
//! - Errors: Domain-specific errors
//! - Lang: User-facing text
//! - Messaging: Message parsing and event dispatching

pub mod errors;
pub mod lang;
pub mod services;
pub mod messaging;
