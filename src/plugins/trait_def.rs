//! Plugin trait definitions

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::application::lang::Lang;
use crate::application::messaging::parser::find_unicode_emoji;
use crate::application::services::InputCollector;
use crate::domain::entities::{
    Channel, ChatMessage, Command, Emoji, Member, Role, Setting, SettingValue,
};
use crate::domain::traits::Platform;
use crate::infrastructure::storage::PersistentStore;
use crate::plugins::manager::{PluginRegistry, CONFIG_NAMESPACE};

/// Core plugin trait that all plugins must implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier, also the name of the plugin's state file
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Settings an administrator must supply before the plugin can be
    /// activated. Plugins without settings count as configured on load.
    fn setup_template(&self) -> Vec<Setting> {
        Vec::new()
    }

    /// Commands registered while the plugin is active
    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    fn message_stream(&self) -> Option<Arc<dyn MessageStream>> {
        None
    }

    fn join_stream(&self) -> Option<Arc<dyn MemberStream>> {
        None
    }

    fn leave_stream(&self) -> Option<Arc<dyn MemberStream>> {
        None
    }

    /// Runs on activation, before anything of the plugin is registered
    async fn init(&self, _ctx: &PluginContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Passive processor run on every inbound message before command parsing
#[async_trait]
pub trait MessageStream: Send + Sync {
    fn name(&self) -> &str;

    /// Channels this stream listens to. `None` means all of them.
    fn channels(&self) -> Option<Vec<String>> {
        None
    }

    /// Returns whether the message may still be handled as a command
    async fn run(&self, ctx: &PluginContext<'_>, message: &ChatMessage) -> Result<bool, CommandError>;
}

/// Processor for members joining or leaving the community
#[async_trait]
pub trait MemberStream: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &PluginContext<'_>, member: &Member) -> Result<(), CommandError>;
}

/// What a running plugin sees of the bot
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    registry: &'a PluginRegistry,
    plugin: &'a str,
}

impl<'a> PluginContext<'a> {
    pub fn new(registry: &'a PluginRegistry, plugin: &'a str) -> Self {
        Self { registry, plugin }
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    pub fn registry(&self) -> &'a PluginRegistry {
        self.registry
    }

    pub fn platform(&self) -> &'a Arc<dyn Platform> {
        self.registry.platform()
    }

    pub fn collector(&self) -> &'a InputCollector {
        self.registry.collector()
    }

    pub fn lang(&self) -> &'a Lang {
        self.registry.lang()
    }

    /// The plugin's own store, present when it has a setup template
    pub fn store(&self) -> Option<Arc<PersistentStore>> {
        self.registry.store_of(self.plugin)
    }

    /// Send a message, returning the new message's id
    pub async fn send(&self, channel_id: &str, text: &str) -> Result<String, CommandError> {
        Ok(self.platform().send_message(channel_id, text).await?)
    }

    /// Raw value of a configured setting
    pub fn setting(&self, name: &str) -> Result<SettingValue, CommandError> {
        self.store()
            .and_then(|store| store.read_as::<SettingValue>(CONFIG_NAMESPACE, name))
            .ok_or_else(|| CommandError::Critical(self.lang().missing_setting(name)))
    }

    pub fn text_setting(&self, name: &str) -> Result<String, CommandError> {
        match self.setting(name)? {
            SettingValue::Text(text) => Ok(text),
            other => Err(self.wrong_shape(name, &other)),
        }
    }

    pub fn number_setting(&self, name: &str) -> Result<i64, CommandError> {
        match self.setting(name)? {
            SettingValue::Number(n) => Ok(n),
            other => Err(self.wrong_shape(name, &other)),
        }
    }

    pub fn list_setting(&self, name: &str) -> Result<Vec<String>, CommandError> {
        match self.setting(name)? {
            SettingValue::List(items) => Ok(items),
            other => Err(self.wrong_shape(name, &other)),
        }
    }

    /// Resolve a channel setting, failing critically if the channel is gone
    pub async fn channel_setting(&self, name: &str) -> Result<Channel, CommandError> {
        let id = self.text_setting(name)?;
        let found = self.platform().fetch_channel(&id).await?;
        found.ok_or_else(|| self.vanished("channel", &id))
    }

    pub async fn role_setting(&self, name: &str) -> Result<Role, CommandError> {
        let id = self.text_setting(name)?;
        let found = self.platform().fetch_role(&id).await?;
        found.ok_or_else(|| self.vanished("role", &id))
    }

    pub async fn member_setting(&self, name: &str) -> Result<Member, CommandError> {
        let id = self.text_setting(name)?;
        let found = self.platform().fetch_member(&id).await?;
        found.ok_or_else(|| self.vanished("user", &id))
    }

    /// Resolve an emoji setting. Custom emojis must still exist.
    pub async fn emoji_setting(&self, name: &str) -> Result<Emoji, CommandError> {
        let key = self.text_setting(name)?;
        if let Some(custom) = self.platform().fetch_emoji(&key).await? {
            return Ok(custom);
        }
        match find_unicode_emoji(&key) {
            Some(grapheme) if grapheme == key => Ok(Emoji::Unicode(grapheme)),
            _ => Err(self.vanished("emoji", &key)),
        }
    }

    fn vanished(&self, kind: &str, id: &str) -> CommandError {
        CommandError::Critical(self.lang().vanished_setting(kind, id))
    }

    fn wrong_shape(&self, name: &str, value: &SettingValue) -> CommandError {
        tracing::warn!("Setting {} of {} has unexpected value {:?}", name, self.plugin, value);
        CommandError::Critical(self.lang().missing_setting(name))
    }
}
