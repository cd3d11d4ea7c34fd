//! Plugin system for herald-bot
//!
//! Plugins contribute chat commands, emoji commands and passive streams.
//! The registry activates them, keeps their state and routes events to them.

pub mod builtin;
pub mod greetings;
pub mod manager;
pub mod manifest;
pub mod permissions;
pub mod trait_def;

pub use manager::{ActivationOutcome, ConfigureOutcome, PluginRegistry, PluginStatus};
pub use trait_def::{MemberStream, MessageStream, Plugin, PluginContext};
