//! Domain entities - Core business objects

pub mod command;
pub mod member;
pub mod message;
pub mod permission;
pub mod setting;

pub use command::{ChatCommand, Command, CommandTable, EmojiCommand, Registered};
pub use member::{Channel, Emoji, Member, Role};
pub use message::{ChatMessage, Mentions, MessageRef, Reaction};
pub use permission::PermissionTier;
pub use setting::{InputKind, Setting, SettingValue};
