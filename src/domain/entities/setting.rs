use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of answer a query expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    /// a community member
    User,
    /// a unicode or custom emoji
    Emoji,
    Role,
    Channel,
    /// the reply message itself
    Message,
    /// the reply's text content
    Text,
    /// a base-10 integer
    Number,
    /// text items separated by line breaks
    TextList,
    /// channel mentions or ids, one per line
    ChannelList,
    /// role mentions or ids, one per line
    RoleList,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::User => "user",
            InputKind::Emoji => "emoji",
            InputKind::Role => "role",
            InputKind::Channel => "channel",
            InputKind::Message => "message",
            InputKind::Text => "text",
            InputKind::Number => "number",
            InputKind::TextList => "text list",
            InputKind::ChannelList => "channel list",
            InputKind::RoleList => "role list",
        };
        write!(f, "{}", name)
    }
}

/// One entry of a plugin's setup template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub kind: InputKind,
    pub prompt: Option<String>,
    /// Use the long query timeout, for answers that take a while to write
    pub long_form: bool,
}

impl Setting {
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
            prompt: None,
            long_form: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn long_form(mut self) -> Self {
        self.long_form = true;
        self
    }

    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or(&self.name)
    }
}

/// A stored configuration value.
///
/// Ids (users, roles, channels) and emoji keys are stored as text, a
/// message as `[channel_id, message_id]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(i64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    /// Whether this value may be stored for a setting of `kind`
    pub fn conforms_to(&self, kind: InputKind) -> bool {
        match (self, kind) {
            (
                SettingValue::Text(_),
                InputKind::User
                | InputKind::Emoji
                | InputKind::Role
                | InputKind::Channel
                | InputKind::Text,
            ) => true,
            (SettingValue::Number(_), InputKind::Number) => true,
            (SettingValue::List(items), InputKind::Message) => items.len() == 2,
            (
                SettingValue::List(_),
                InputKind::TextList | InputKind::ChannelList | InputKind::RoleList,
            ) => true,
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<SettingValue> for serde_json::Value {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Bool(b) => serde_json::Value::Bool(b),
            SettingValue::Number(n) => serde_json::Value::from(n),
            SettingValue::Text(s) => serde_json::Value::String(s),
            SettingValue::List(items) => serde_json::Value::from(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conformance() {
        let id = SettingValue::Text("123".into());
        assert!(id.conforms_to(InputKind::Channel));
        assert!(!id.conforms_to(InputKind::Number));

        let msg = SettingValue::List(vec!["1".into(), "2".into()]);
        assert!(msg.conforms_to(InputKind::Message));
        assert!(!SettingValue::List(vec!["1".into()]).conforms_to(InputKind::Message));

        assert!(!SettingValue::Bool(true).conforms_to(InputKind::Text));
    }

    #[test]
    fn test_untagged_json_shape() {
        let value = serde_json::to_value(SettingValue::List(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(value, serde_json::json!(["a", "b"]));

        let back: SettingValue = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert_eq!(back, SettingValue::Number(42));
    }

    #[test]
    fn test_prompt_falls_back_to_name() {
        let setting = Setting::new("join_channel", InputKind::Channel);
        assert_eq!(setting.prompt_text(), "join_channel");
        assert_eq!(setting.with_prompt("Where?").prompt_text(), "Where?");
    }
}
