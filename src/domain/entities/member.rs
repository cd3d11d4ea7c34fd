use serde::{Deserialize, Serialize};
use std::fmt;

/// A member of the managed community
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub username: Option<String>,
    pub nickname: Option<String>,
    /// Ids of the roles the member holds
    pub roles: Vec<String>,
    /// Native administrator capability of the platform
    pub administrator: bool,
    pub is_bot: bool,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            nickname: None,
            roles: Vec::new(),
            administrator: false,
            is_bot: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.roles.push(role_id.into());
        self
    }

    pub fn as_administrator(mut self) -> Self {
        self.administrator = true;
        self
    }

    pub fn as_bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn display_name(&self) -> String {
        if let Some(ref nick) = self.nickname {
            nick.clone()
        } else if let Some(ref username) = self.username {
            username.clone()
        } else {
            self.id.clone()
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<@&{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// A reaction emoji, either a platform custom emoji or a unicode grapheme
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emoji {
    Custom {
        id: String,
        name: String,
        animated: bool,
    },
    Unicode(String),
}

impl Emoji {
    pub fn custom(id: impl Into<String>, name: impl Into<String>) -> Self {
        Emoji::Custom {
            id: id.into(),
            name: name.into(),
            animated: false,
        }
    }

    pub fn unicode(grapheme: impl Into<String>) -> Self {
        Emoji::Unicode(grapheme.into())
    }

    /// Lookup key of the emoji: the id for custom emojis, the grapheme otherwise.
    /// This is also the form settings store emojis in.
    pub fn key(&self) -> &str {
        match self {
            Emoji::Custom { id, .. } => id,
            Emoji::Unicode(s) => s,
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emoji::Custom { id, name, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{}:{}:{}>", prefix, name, id)
            }
            Emoji::Unicode(s) => write!(f, "{}", s),
        }
    }
}
