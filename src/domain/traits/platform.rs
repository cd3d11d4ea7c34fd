use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{Channel, ChatMessage, Emoji, Member, MessageRef, Reaction, Role};

/// Platform trait - abstraction over the chat transport of the managed community
#[async_trait]
pub trait Platform: Send + Sync {
    /// Start delivering inbound events until the transport shuts down
    async fn start(&self, events: mpsc::Sender<PlatformEvent>) -> Result<(), BotError>;

    /// Send a message to a channel, returning the new message's id
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    async fn fetch_member(&self, user_id: &str) -> Result<Option<Member>, BotError>;

    async fn fetch_role(&self, role_id: &str) -> Result<Option<Role>, BotError>;

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<Channel>, BotError>;

    /// Look up a custom emoji of the community by id
    async fn fetch_emoji(&self, emoji_id: &str) -> Result<Option<Emoji>, BotError>;

    async fn add_reaction(&self, message: &MessageRef, emoji: &Emoji) -> Result<(), BotError>;

    /// Remove one member's reaction from a message
    async fn remove_reaction(
        &self,
        message: &MessageRef,
        emoji: &Emoji,
        user_id: &str,
    ) -> Result<(), BotError>;

    fn bot_info(&self) -> BotInfo;
}

/// Inbound event delivered by the transport
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    MessageCreated(ChatMessage),
    ReactionAdded { reaction: Reaction, user_id: String },
    MemberJoined(Member),
    MemberLeft(Member),
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
