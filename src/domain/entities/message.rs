use super::{Emoji, Member};
use chrono::{DateTime, Utc};

/// Entities mentioned in a message, as reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentions {
    pub users: Vec<String>,
    pub roles: Vec<String>,
    pub channels: Vec<String>,
}

/// An inbound chat message
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub author: Member,
    pub content: String,
    pub mentions: Mentions,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(channel_id: impl Into<String>, author: Member, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            author,
            content: content.into(),
            mentions: Mentions::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mentions(mut self, mentions: Mentions) -> Self {
        self.mentions = mentions;
        self
    }

    pub fn reference(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id.clone(),
            message_id: self.id.clone(),
        }
    }
}

/// Location of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// A reaction placed under a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub message: MessageRef,
    pub emoji: Emoji,
}

impl Reaction {
    pub fn new(message: MessageRef, emoji: Emoji) -> Self {
        Self { message, emoji }
    }
}
