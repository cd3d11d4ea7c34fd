//! Domain layer - Core business objects and transport abstractions
//!
//! This layer contains:
//! - Entities: members, messages, commands, permission tiers, settings
//! - Traits: the chat transport seen by the core

pub mod entities;
pub mod traits;
