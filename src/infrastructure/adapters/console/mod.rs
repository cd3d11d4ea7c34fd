//! Console adapter for development/testing
//!
//! Keeps a small in-memory community (members, roles, channels, emojis),
//! prints what the bot sends and records it for inspection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::messaging::parser::{find_custom_emoji, find_unicode_emoji, parse_mentions};
use crate::domain::entities::{Channel, ChatMessage, Emoji, Member, MessageRef, Reaction, Role};
use crate::domain::traits::{BotInfo, Platform, PlatformEvent};

/// A message the bot sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
    pub text: String,
}

/// A reaction the bot removed on someone's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedReaction {
    pub message: MessageRef,
    pub emoji: Emoji,
    pub user_id: String,
}

#[derive(Default)]
struct Directory {
    members: HashMap<String, Member>,
    roles: HashMap<String, Role>,
    channels: HashMap<String, Channel>,
    emojis: HashMap<String, Emoji>,
}

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    operator_id: String,
    home_channel: String,
    echo: bool,
    directory: RwLock<Directory>,
    outbox: Mutex<Vec<SentMessage>>,
    reactions_added: Mutex<Vec<(MessageRef, Emoji)>>,
    reactions_removed: Mutex<Vec<RemovedReaction>>,
}

impl ConsoleAdapter {
    /// Create a community with an administrator operator posting in `home_channel`
    pub fn new(operator_id: impl Into<String>, home_channel: impl Into<String>) -> Self {
        let operator_id = operator_id.into();
        let home_channel = home_channel.into();

        let adapter = Self {
            info: BotInfo {
                id: "console-bot".to_string(),
                name: "herald-bot".to_string(),
                username: "console".to_string(),
            },
            operator_id: operator_id.clone(),
            home_channel: home_channel.clone(),
            echo: false,
            directory: RwLock::new(Directory::default()),
            outbox: Mutex::new(Vec::new()),
            reactions_added: Mutex::new(Vec::new()),
            reactions_removed: Mutex::new(Vec::new()),
        };
        adapter.add_member(
            Member::new(operator_id)
                .with_username("operator")
                .as_administrator(),
        );
        adapter.add_channel(Channel::new(home_channel.clone(), home_channel));
        adapter
    }

    /// Print outbound messages to stdout
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn home_channel(&self) -> &str {
        &self.home_channel
    }

    fn dir(&self) -> std::sync::RwLockReadGuard<'_, Directory> {
        self.directory.read().unwrap_or_else(|e| e.into_inner())
    }

    fn dir_mut(&self) -> std::sync::RwLockWriteGuard<'_, Directory> {
        self.directory.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_member(&self, member: Member) {
        self.dir_mut().members.insert(member.id.clone(), member);
    }

    pub fn remove_member(&self, user_id: &str) -> Option<Member> {
        self.dir_mut().members.remove(user_id)
    }

    pub fn add_role(&self, role: Role) {
        self.dir_mut().roles.insert(role.id.clone(), role);
    }

    pub fn remove_role(&self, role_id: &str) {
        self.dir_mut().roles.remove(role_id);
    }

    pub fn add_channel(&self, channel: Channel) {
        self.dir_mut().channels.insert(channel.id.clone(), channel);
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.dir_mut().channels.remove(channel_id);
    }

    pub fn add_emoji(&self, emoji: Emoji) {
        self.dir_mut().emojis.insert(emoji.key().to_string(), emoji);
    }

    pub fn member(&self, user_id: &str) -> Option<Member> {
        self.dir().members.get(user_id).cloned()
    }

    /// Build an inbound message as the transport would deliver it
    pub fn message_from(
        &self,
        user_id: &str,
        channel_id: &str,
        text: &str,
    ) -> Option<ChatMessage> {
        let author = self.member(user_id)?;
        Some(ChatMessage::new(channel_id, author, text).with_mentions(parse_mentions(text)))
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts sent to one channel, oldest first
    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.text)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn removed_reactions(&self) -> Vec<RemovedReaction> {
        self.reactions_removed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn resolve_emoji(&self, text: &str) -> Option<Emoji> {
        if let Some(custom) = find_custom_emoji(text) {
            return self.dir().emojis.get(custom.key()).cloned().or(Some(custom));
        }
        find_unicode_emoji(text).map(Emoji::Unicode)
    }

    /// Turn one console line into an event.
    ///
    /// `::join <id> [name]`, `::leave <id>`, `::react <message-id> <emoji>`
    /// and `::as <id> <text>` simulate other activity; anything else is a
    /// message from the operator in the home channel.
    pub fn parse_line(&self, line: &str) -> Option<PlatformEvent> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }

        let Some(rest) = line.strip_prefix("::") else {
            return self
                .message_from(&self.operator_id, &self.home_channel, line)
                .map(PlatformEvent::MessageCreated);
        };

        let mut parts = rest.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("join"), Some(id), name) => {
                let mut member = Member::new(id);
                if let Some(name) = name {
                    member = member.with_username(name);
                }
                self.add_member(member.clone());
                Some(PlatformEvent::MemberJoined(member))
            }
            (Some("leave"), Some(id), _) => self.remove_member(id).map(PlatformEvent::MemberLeft),
            (Some("react"), Some(message_id), Some(emoji)) => {
                let emoji = self.resolve_emoji(emoji)?;
                Some(PlatformEvent::ReactionAdded {
                    reaction: Reaction::new(
                        MessageRef {
                            channel_id: self.home_channel.clone(),
                            message_id: message_id.to_string(),
                        },
                        emoji,
                    ),
                    user_id: self.operator_id.clone(),
                })
            }
            (Some("as"), Some(id), Some(text)) => self
                .message_from(id, &self.home_channel, text)
                .map(PlatformEvent::MessageCreated),
            _ => {
                tracing::warn!("Unknown console directive: {}", line);
                None
            }
        }
    }
}

#[async_trait]
impl Platform for ConsoleAdapter {
    async fn start(&self, events: mpsc::Sender<PlatformEvent>) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Platform(e.to_string()))?
        {
            if let Some(event) = self.parse_line(&line) {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }

        tracing::info!("Console input closed");
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError> {
        if !self.dir().channels.contains_key(channel_id) {
            return Err(BotError::Platform(format!("Unknown channel {}", channel_id)));
        }

        let id = uuid::Uuid::new_v4().to_string();
        if self.echo {
            println!("[BOT #{}] {}", channel_id, text);
        }
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                id: id.clone(),
                channel_id: channel_id.to_string(),
                text: text.to_string(),
            });
        Ok(id)
    }

    async fn fetch_member(&self, user_id: &str) -> Result<Option<Member>, BotError> {
        Ok(self.member(user_id))
    }

    async fn fetch_role(&self, role_id: &str) -> Result<Option<Role>, BotError> {
        Ok(self.dir().roles.get(role_id).cloned())
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<Channel>, BotError> {
        Ok(self.dir().channels.get(channel_id).cloned())
    }

    async fn fetch_emoji(&self, emoji_id: &str) -> Result<Option<Emoji>, BotError> {
        Ok(self.dir().emojis.get(emoji_id).cloned())
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &Emoji) -> Result<(), BotError> {
        if self.echo {
            println!("[BOT reacts {} on {}]", emoji, message.message_id);
        }
        self.reactions_added
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((message.clone(), emoji.clone()));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        emoji: &Emoji,
        user_id: &str,
    ) -> Result<(), BotError> {
        self.reactions_removed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RemovedReaction {
                message: message.clone(),
                emoji: emoji.clone(),
                user_id: user_id.to_string(),
            });
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
