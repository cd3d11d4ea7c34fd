use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ChatMessage, Emoji, Member, PermissionTier, Reaction};
use crate::application::errors::CommandError;
use crate::plugins::trait_def::PluginContext;

/// A command triggered by a text message
#[async_trait]
pub trait ChatCommand: Send + Sync {
    /// Token that follows the command prefix
    fn name(&self) -> &str;

    /// Lowest tier allowed to run the command
    fn permission(&self) -> PermissionTier {
        PermissionTier::Admin
    }

    fn help_text(&self) -> String {
        String::new()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<(), CommandError>;
}

/// A command triggered by reacting with a specific emoji
#[async_trait]
pub trait EmojiCommand: Send + Sync {
    fn name(&self) -> &str;

    /// The emoji bound to this command. Usually resolved in the plugin's
    /// init from its settings; commands without an emoji are not registered.
    fn emoji(&self) -> Option<Emoji>;

    fn permission(&self) -> PermissionTier {
        PermissionTier::Admin
    }

    /// Remove the reaction when the reacting member lacks permission
    fn remove_invalid(&self) -> bool {
        true
    }

    fn help_text(&self) -> String {
        String::new()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        reaction: &Reaction,
        member: &Member,
    ) -> Result<(), CommandError>;
}

/// A command contributed by a plugin
#[derive(Clone)]
pub enum Command {
    Chat(Arc<dyn ChatCommand>),
    Emoji(Arc<dyn EmojiCommand>),
}

impl Command {
    pub fn chat<C: ChatCommand + 'static>(command: C) -> Self {
        Command::Chat(Arc::new(command))
    }

    pub fn emoji<C: EmojiCommand + 'static>(command: C) -> Self {
        Command::Emoji(Arc::new(command))
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Chat(c) => c.name(),
            Command::Emoji(c) => c.name(),
        }
    }

    pub fn permission(&self) -> PermissionTier {
        match self {
            Command::Chat(c) => c.permission(),
            Command::Emoji(c) => c.permission(),
        }
    }

    pub fn help_text(&self) -> String {
        match self {
            Command::Chat(c) => c.help_text(),
            Command::Emoji(c) => c.help_text(),
        }
    }
}

/// A live table entry, remembering which plugin put it there
pub struct Registered<T: ?Sized> {
    pub owner: String,
    pub command: Arc<T>,
}

impl<T: ?Sized> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            command: Arc::clone(&self.command),
        }
    }
}

/// Live lookup tables used for dispatch.
///
/// Chat commands are keyed by name, emoji commands by the emoji's key.
#[derive(Default)]
pub struct CommandTable {
    chat: HashMap<String, Registered<dyn ChatCommand>>,
    emoji: HashMap<String, Registered<dyn EmojiCommand>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a command for `owner`, returning the key it was stored under.
    /// Emoji commands without an emoji are skipped.
    pub fn register(&mut self, owner: &str, command: &Command) -> Option<String> {
        match command {
            Command::Chat(c) => {
                let key = c.name().to_lowercase();
                if let Some(previous) = self.chat.get(&key).filter(|r| r.owner != owner) {
                    tracing::warn!(
                        "Chat command '{}' of {} replaced by {}",
                        key,
                        previous.owner,
                        owner
                    );
                }
                self.chat.insert(
                    key.clone(),
                    Registered {
                        owner: owner.to_string(),
                        command: Arc::clone(c),
                    },
                );
                Some(key)
            }
            Command::Emoji(c) => {
                let Some(emoji) = c.emoji() else {
                    tracing::warn!("Emoji command '{}' of {} has no emoji, skipping", c.name(), owner);
                    return None;
                };
                let key = emoji.key().to_string();
                self.emoji.insert(
                    key.clone(),
                    Registered {
                        owner: owner.to_string(),
                        command: Arc::clone(c),
                    },
                );
                Some(key)
            }
        }
    }

    /// Remove every entry owned by `owner`
    pub fn unregister_owner(&mut self, owner: &str) {
        self.chat.retain(|_, r| r.owner != owner);
        self.emoji.retain(|_, r| r.owner != owner);
    }

    pub fn chat(&self, name: &str) -> Option<Registered<dyn ChatCommand>> {
        self.chat.get(&name.to_lowercase()).cloned()
    }

    pub fn emoji(&self, key: &str) -> Option<Registered<dyn EmojiCommand>> {
        self.emoji.get(key).cloned()
    }

    pub fn all_chat(&self) -> impl Iterator<Item = &Registered<dyn ChatCommand>> {
        self.chat.values()
    }

    pub fn all_emoji(&self) -> impl Iterator<Item = (&String, &Registered<dyn EmojiCommand>)> {
        self.emoji.iter()
    }

    pub fn owns_any(&self, owner: &str) -> bool {
        self.chat.values().any(|r| r.owner == owner) || self.emoji.values().any(|r| r.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.chat.len() + self.emoji.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[async_trait]
    impl ChatCommand for Ping {
        fn name(&self) -> &str {
            "Ping"
        }

        async fn run(
            &self,
            _ctx: &PluginContext<'_>,
            _message: &ChatMessage,
            _args: &[String],
        ) -> Result<(), CommandError> {
            Ok(())
        }
    }

    struct Unbound;

    #[async_trait]
    impl EmojiCommand for Unbound {
        fn name(&self) -> &str {
            "unbound"
        }

        fn emoji(&self) -> Option<Emoji> {
            None
        }

        async fn run(
            &self,
            _ctx: &PluginContext<'_>,
            _reaction: &Reaction,
            _member: &Member,
        ) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn test_chat_lookup_is_case_insensitive() {
        let mut table = CommandTable::new();
        assert_eq!(table.register("a", &Command::chat(Ping)), Some("ping".to_string()));
        assert!(table.chat("PING").is_some());
        assert_eq!(table.chat("ping").unwrap().owner, "a");
    }

    #[test]
    fn test_unregister_only_removes_owner_entries() {
        let mut table = CommandTable::new();
        table.register("a", &Command::chat(Ping));
        table.register("b", &Command::chat(Ping));
        // b replaced a's entry, so removing a must leave it
        table.unregister_owner("a");
        assert!(table.chat("ping").is_some());
        table.unregister_owner("b");
        assert!(table.is_empty());
    }

    #[test]
    fn test_emoji_without_binding_is_skipped() {
        let mut table = CommandTable::new();
        assert!(table.register("a", &Command::emoji(Unbound)).is_none());
        assert!(table.is_empty());
    }
}
