//! herald-bot - plugin command routing for a chat community
//!
//! Plugins contribute chat commands, emoji commands and passive streams.
//! Administrators configure them through questions asked in the chat, and
//! every command is gated by a permission tier.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::{BotError, CommandError};
pub use infrastructure::config::Config;
pub use plugins::{Plugin, PluginContext, PluginRegistry};
