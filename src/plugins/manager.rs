//! Plugin manager - handles plugin lifecycle and execution
//!
//! The registry owns the plugin table, the per-plugin state flags and the
//! live dispatch tables. Activation and deactivation are serialized; the
//! dispatch tables are only touched in short critical sections, never
//! across an await, and handlers are cloned out before they run.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, CommandError, FatalSignal, PluginError};
use crate::application::lang::{Lang, PluginListEntry};
use crate::application::messaging::parser::MessageParser;
use crate::application::services::{InputCollector, PermissionResolver, QueryOptions};
use crate::domain::entities::{
    ChatCommand, ChatMessage, Command, CommandTable, EmojiCommand, Member, PermissionTier, Reaction,
    Registered,
};
use crate::domain::traits::Platform;
use crate::infrastructure::config::{Config, QueryConfig};
use crate::infrastructure::storage::{PersistentStore, StateDirectory};
use crate::plugins::permissions::{PermissionsPlugin, PERMISSIONS_PLUGIN};
use crate::plugins::trait_def::{MemberStream, MessageStream, Plugin, PluginContext};

/// Identifier of the manager's own state file
pub const MANAGER_STATE: &str = "plugin_manager";
/// Namespace of a plugin's store that holds its configuration answers
pub const CONFIG_NAMESPACE: &str = "config";

const CONFIGURED: &str = "configured";
const ACTIVE: &str = "active";

/// Result of [`PluginRegistry::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    NotFound,
    NotConfigured,
    Activated,
    /// `init` failed; nothing was registered
    InitFailed,
}

/// Result of [`PluginRegistry::configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    NotFound,
    /// The plugin has no settings
    NoTemplate,
    /// A question was canceled or timed out; nothing was written
    Aborted,
    /// All answers stored. `restarted` is set if the plugin was active and
    /// came back up with the new configuration.
    Configured { restarted: bool },
}

/// Status row for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStatus {
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub configured: bool,
    pub has_template: bool,
}

impl PluginStatus {
    pub fn as_list_entry(&self) -> PluginListEntry<'_> {
        PluginListEntry {
            name: &self.name,
            description: self.description.as_deref(),
            active: self.active,
            configured: self.configured,
        }
    }
}

struct LoadedPlugin {
    plugin: Arc<dyn Plugin>,
    store: Option<Arc<PersistentStore>>,
}

struct Stream<T: ?Sized> {
    owner: String,
    stream: Arc<T>,
}

impl<T: ?Sized> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            stream: Arc::clone(&self.stream),
        }
    }
}

#[derive(Default)]
struct DispatchTables {
    commands: CommandTable,
    message_streams: Vec<Stream<dyn MessageStream>>,
    join_streams: Vec<Stream<dyn MemberStream>>,
    leave_streams: Vec<Stream<dyn MemberStream>>,
}

impl DispatchTables {
    fn register(&mut self, owner: &str, plugin: &dyn Plugin) {
        for command in plugin.commands() {
            self.commands.register(owner, &command);
        }
        if let Some(stream) = plugin.message_stream() {
            self.message_streams.push(Stream {
                owner: owner.to_string(),
                stream,
            });
        }
        if let Some(stream) = plugin.join_stream() {
            self.join_streams.push(Stream {
                owner: owner.to_string(),
                stream,
            });
        }
        if let Some(stream) = plugin.leave_stream() {
            self.leave_streams.push(Stream {
                owner: owner.to_string(),
                stream,
            });
        }
    }

    fn unregister(&mut self, owner: &str) {
        self.commands.unregister_owner(owner);
        self.message_streams.retain(|s| s.owner != owner);
        self.join_streams.retain(|s| s.owner != owner);
        self.leave_streams.retain(|s| s.owner != owner);
    }

    fn owns_any(&self, owner: &str) -> bool {
        self.commands.owns_any(owner)
            || self.message_streams.iter().any(|s| s.owner == owner)
            || self.join_streams.iter().any(|s| s.owner == owner)
            || self.leave_streams.iter().any(|s| s.owner == owner)
    }
}

/// Manages all plugins for the bot
pub struct PluginRegistry {
    platform: Arc<dyn Platform>,
    collector: Arc<InputCollector>,
    permissions: PermissionResolver,
    states: StateDirectory,
    state: Arc<PersistentStore>,
    plugins: RwLock<Vec<LoadedPlugin>>,
    tables: RwLock<DispatchTables>,
    lifecycle: Mutex<()>,
    parser: MessageParser,
    lang: Lang,
    control_channel: String,
    query: QueryConfig,
    fatal: FatalSignal,
}

impl PluginRegistry {
    /// Open the manager state and load the `permissions` plugin.
    ///
    /// Storage failures here are fatal to the caller.
    pub fn new(
        config: &Config,
        platform: Arc<dyn Platform>,
        fatal: FatalSignal,
    ) -> Result<Self, BotError> {
        let lang = Lang::new(config.bot.prefix.clone(), &config.query.cancel_keyword);
        let states = StateDirectory::new(
            config.state.directory.clone(),
            config.state.suffix.clone(),
            fatal.clone(),
        );
        let state = states.open(MANAGER_STATE)?;
        let permission_store = states.open(PERMISSIONS_PLUGIN)?;

        let tiers = config.permissions.role_tiers_descending();
        let permissions = PermissionResolver::new(
            Arc::clone(&platform),
            config.control_channel.clone(),
            tiers.clone(),
            Arc::clone(&permission_store),
            lang.clone(),
        );
        let collector = Arc::new(InputCollector::new(
            Arc::clone(&platform),
            config.bot.prefix.clone(),
            &config.query,
            lang.clone(),
        ));

        let registry = Self {
            platform,
            collector,
            permissions,
            states,
            state,
            plugins: RwLock::new(Vec::new()),
            tables: RwLock::new(DispatchTables::default()),
            lifecycle: Mutex::new(()),
            parser: MessageParser::new(config.bot.prefix.clone()),
            lang: lang.clone(),
            control_channel: config.control_channel.clone(),
            query: config.query.clone(),
            fatal,
        };

        registry.insert(
            Arc::new(PermissionsPlugin::new(tiers, &lang)),
            Some(permission_store),
        )?;
        Ok(registry)
    }

    // ---- accessors ----

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn collector(&self) -> &InputCollector {
        &self.collector
    }

    pub fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    pub fn control_channel(&self) -> &str {
        &self.control_channel
    }

    pub fn fatal(&self) -> &FatalSignal {
        &self.fatal
    }

    fn plugins(&self) -> RwLockReadGuard<'_, Vec<LoadedPlugin>> {
        self.plugins.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tables(&self) -> RwLockReadGuard<'_, DispatchTables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tables_mut(&self) -> RwLockWriteGuard<'_, DispatchTables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    // ---- plugin table ----

    /// Add a plugin to the table.
    ///
    /// Plugins without a setup template are configured right away, the
    /// others get a store and stay unconfigured until `configure` succeeds.
    pub fn load(&self, plugin: Arc<dyn Plugin>) -> Result<(), BotError> {
        let store = if plugin.setup_template().is_empty() {
            None
        } else {
            Some(self.states.open(plugin.name())?)
        };
        self.insert(plugin, store)
    }

    fn insert(
        &self,
        plugin: Arc<dyn Plugin>,
        store: Option<Arc<PersistentStore>>,
    ) -> Result<(), BotError> {
        let name = plugin.name().to_string();
        {
            let mut plugins = self.plugins.write().unwrap_or_else(|e| e.into_inner());
            if plugins.iter().any(|p| p.plugin.name() == name) {
                return Err(PluginError::Duplicate(name).into());
            }
            plugins.push(LoadedPlugin {
                plugin,
                store: store.clone(),
            });
        }

        if store.is_none() {
            self.state.write(&name, CONFIGURED, true);
        }
        info!("Loaded plugin: {}", name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins()
            .iter()
            .find(|p| p.plugin.name() == name)
            .map(|p| Arc::clone(&p.plugin))
    }

    /// Store of a plugin with a setup template
    pub fn store_of(&self, name: &str) -> Option<Arc<PersistentStore>> {
        self.plugins()
            .iter()
            .find(|p| p.plugin.name() == name)
            .and_then(|p| p.store.clone())
    }

    /// Names in load order
    pub fn names(&self) -> Vec<String> {
        self.plugins()
            .iter()
            .map(|p| p.plugin.name().to_string())
            .collect()
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.state.read_bool(name, CONFIGURED)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state.read_bool(name, ACTIVE)
    }

    pub fn statuses(&self) -> Vec<PluginStatus> {
        let plugins: Vec<Arc<dyn Plugin>> =
            self.plugins().iter().map(|p| Arc::clone(&p.plugin)).collect();

        plugins
            .into_iter()
            .map(|plugin| {
                let name = plugin.name().to_string();
                PluginStatus {
                    description: plugin.description().map(String::from),
                    active: self.is_active(&name),
                    configured: self.is_configured(&name),
                    has_template: !plugin.setup_template().is_empty(),
                    name,
                }
            })
            .collect()
    }

    /// Names of a plugin's chat commands and emoji triggers, whether or not
    /// it is active
    pub fn plugin_commands(&self, name: &str) -> Option<(Vec<String>, Vec<String>)> {
        let plugin = self.plugin(name)?;
        let mut chat = Vec::new();
        let mut emoji = Vec::new();
        for command in plugin.commands() {
            match command {
                Command::Chat(c) => chat.push(c.name().to_string()),
                Command::Emoji(c) => {
                    if let Some(e) = c.emoji() {
                        emoji.push(e.to_string());
                    }
                }
            }
        }
        Some((chat, emoji))
    }

    /// Live commands a member of `tier` may use, sorted by name
    pub fn visible_commands(&self, tier: PermissionTier) -> (Vec<String>, Vec<String>) {
        let tables = self.tables();
        let mut chat: Vec<String> = tables
            .commands
            .all_chat()
            .filter(|r| r.command.permission() <= tier)
            .map(|r| r.command.name().to_lowercase())
            .collect();
        let mut emoji: Vec<String> = tables
            .commands
            .all_emoji()
            .filter(|(_, r)| r.command.permission() <= tier)
            .filter_map(|(_, r)| r.command.emoji().map(|e| e.to_string()))
            .collect();
        chat.sort();
        emoji.sort();
        (chat, emoji)
    }

    pub fn chat_command(&self, name: &str) -> Option<Registered<dyn ChatCommand>> {
        self.tables().commands.chat(name)
    }

    pub fn emoji_command(&self, key: &str) -> Option<Registered<dyn EmojiCommand>> {
        self.tables().commands.emoji(key)
    }

    /// Whether anything of `owner` is reachable by dispatch
    pub fn has_registrations(&self, owner: &str) -> bool {
        self.tables().owns_any(owner)
    }

    // ---- lifecycle ----

    /// Initialize and register an always-on plugin. Built-ins are not part
    /// of the plugin table and cannot be deactivated.
    pub async fn add_builtin(&self, plugin: Arc<dyn Plugin>) -> Result<(), BotError> {
        let _lifecycle = self.lifecycle.lock().await;
        let name = plugin.name().to_string();

        if let Err(e) = plugin.init(&PluginContext::new(self, &name)).await {
            return Err(BotError::Internal(format!(
                "built-in {} failed to initialize: {}",
                name, e
            )));
        }
        self.tables_mut().register(&name, plugin.as_ref());
        info!("Registered built-in commands: {}", name);
        Ok(())
    }

    pub async fn activate(&self, name: &str) -> Result<ActivationOutcome, BotError> {
        let _lifecycle = self.lifecycle.lock().await;
        self.activate_locked(name).await
    }

    async fn activate_locked(&self, name: &str) -> Result<ActivationOutcome, BotError> {
        let Some(plugin) = self.plugin(name) else {
            return Ok(ActivationOutcome::NotFound);
        };
        if !self.is_configured(name) {
            info!("Refusing to activate unconfigured plugin {}", name);
            return Ok(ActivationOutcome::NotConfigured);
        }
        if self.is_active(name) {
            debug!("Restarting active plugin {}", name);
            self.deactivate_locked(name);
        }

        let ctx = PluginContext::new(self, name);
        match plugin.init(&ctx).await {
            Ok(()) => {}
            Err(CommandError::Critical(reason)) => {
                self.report(&self.lang.critical_plugin_error(name, &reason)).await;
                self.mark_broken(name);
                return Ok(ActivationOutcome::InitFailed);
            }
            Err(CommandError::Bot(e)) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Plugin {} failed to initialize: {}", name, e);
                self.report(&self.lang.uncaught_error(name, None)).await;
                return Ok(ActivationOutcome::InitFailed);
            }
        }

        {
            let mut tables = self.tables_mut();
            tables.register(name, plugin.as_ref());
            self.state.write(name, ACTIVE, true);
        }
        info!("Activated plugin {}", name);
        Ok(ActivationOutcome::Activated)
    }

    /// Returns false if the plugin is unknown
    pub async fn deactivate(&self, name: &str) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        self.deactivate_locked(name)
    }

    fn deactivate_locked(&self, name: &str) -> bool {
        if !self.contains(name) {
            return false;
        }
        // handlers go first, the flag after
        self.tables_mut().unregister(name);
        self.state.write(name, ACTIVE, false);
        info!("Deactivated plugin {}", name);
        true
    }

    /// Leave the plugin inactive and unconfigured
    fn mark_broken(&self, name: &str) {
        self.deactivate_locked(name);
        self.state.write(name, CONFIGURED, false);
        warn!("Plugin {} marked unconfigured", name);
    }

    /// Activate every plugin that was active when the bot last ran
    pub async fn initiate_all(&self) -> Result<usize, BotError> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut started = 0;

        for name in self.names() {
            if !self.is_active(name.as_str()) {
                continue;
            }
            // the flag is re-set on success
            self.state.write(&name, ACTIVE, false);
            if self.activate_locked(&name).await? == ActivationOutcome::Activated {
                started += 1;
            }
        }
        info!("Started {} plugins", started);
        Ok(started)
    }

    /// Activate every configured, inactive plugin
    pub async fn activate_all(&self) -> Result<Vec<(String, ActivationOutcome)>, BotError> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut outcomes = Vec::new();

        for name in self.names() {
            if self.is_active(&name) || !self.is_configured(&name) {
                continue;
            }
            let outcome = self.activate_locked(&name).await?;
            outcomes.push((name, outcome));
        }
        Ok(outcomes)
    }

    /// Walk the plugin's setup template with `user_id` in `channel_id`.
    ///
    /// Answers are only written once every question was answered.
    pub async fn configure(
        &self,
        name: &str,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ConfigureOutcome, BotError> {
        let Some(plugin) = self.plugin(name) else {
            return Ok(ConfigureOutcome::NotFound);
        };
        let template = plugin.setup_template();
        let Some(store) = self.store_of(name).filter(|_| !template.is_empty()) else {
            return Ok(ConfigureOutcome::NoTemplate);
        };

        info!("Configuring plugin {} with {}", name, user_id);
        let mut answers = Vec::with_capacity(template.len());
        for setting in &template {
            let timeout = if setting.long_form {
                self.query.long_timeout()
            } else {
                self.query.timeout()
            };
            let outcome = self
                .collector
                .query(
                    channel_id,
                    user_id,
                    setting.prompt_text(),
                    setting.kind,
                    QueryOptions::ids().with_timeout(timeout),
                )
                .await?;

            let Some(answer) = outcome.into_answer() else {
                info!("Configuration of {} aborted at {}", name, setting.name);
                return Ok(ConfigureOutcome::Aborted);
            };
            let value = answer.to_setting_value();
            if !value.conforms_to(setting.kind) {
                return Err(BotError::Internal(format!(
                    "answer for {} does not fit {}",
                    setting.name, setting.kind
                )));
            }
            answers.push((setting.name.clone(), serde_json::Value::from(value)));
        }

        store.write_many(CONFIG_NAMESPACE, answers);
        self.state.write(name, CONFIGURED, true);
        if name == PERMISSIONS_PLUGIN {
            self.permissions.reset_notices();
        }
        info!("Plugin {} configured", name);

        if self.is_active(name) {
            let restarted = self.activate(name).await? == ActivationOutcome::Activated;
            return Ok(ConfigureOutcome::Configured { restarted });
        }
        Ok(ConfigureOutcome::Configured { restarted: false })
    }

    // ---- dispatch ----

    /// Run a chat command, if the message is one the author may use here
    pub async fn dispatch_chat_message(&self, message: &ChatMessage) -> Result<(), BotError> {
        if self.collector.is_in_query(&message.author.id) {
            return Ok(());
        }
        let Some(parsed) = self.parser.parse_command(&message.content) else {
            return Ok(());
        };
        let Some(entry) = self.chat_command(&parsed.name) else {
            return Ok(());
        };

        let required = entry.command.permission();
        let tier = match self.permissions.highest_tier(&message.author).await {
            Ok(tier) => tier,
            Err(e) => {
                let trigger = Some(message.content.as_str());
                return self.settle(&entry.owner, entry.command.name(), trigger, Err(e.into())).await;
            }
        };
        if tier < required {
            debug!("{} ({}) may not use {}", message.author.id, tier, parsed.name);
            self.send_or_warn(
                &message.channel_id,
                &self.lang.insufficient_permission(&parsed.name),
            )
            .await;
            return Ok(());
        }
        if tier == PermissionTier::User
            && required == PermissionTier::User
            && self.permissions.user_command_channel().as_deref() != Some(message.channel_id.as_str())
        {
            debug!("Ignoring {} outside the user command channel", parsed.name);
            return Ok(());
        }

        let ctx = PluginContext::new(self, &entry.owner);
        let result = entry.command.run(&ctx, message, &parsed.args).await;
        self.settle(&entry.owner, entry.command.name(), Some(&message.content), result)
            .await
    }

    /// Run the emoji command bound to the reaction, or take back an
    /// unauthorized reaction
    pub async fn dispatch_reaction(&self, reaction: &Reaction, user_id: &str) -> Result<(), BotError> {
        let Some(entry) = self.emoji_command(reaction.emoji.key()) else {
            return Ok(());
        };
        let (member, tier) = match self.reacting_member(user_id).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("Reaction from unknown member {}", user_id);
                return Ok(());
            }
            Err(e) => {
                return self
                    .settle(&entry.owner, entry.command.name(), None, Err(e.into()))
                    .await;
            }
        };

        if tier < entry.command.permission() {
            if entry.command.remove_invalid() {
                if let Err(e) = self
                    .platform
                    .remove_reaction(&reaction.message, &reaction.emoji, user_id)
                    .await
                {
                    warn!("Failed to remove reaction: {}", e);
                }
            }
            return Ok(());
        }

        let ctx = PluginContext::new(self, &entry.owner);
        let result = entry.command.run(&ctx, reaction, &member).await;
        self.settle(&entry.owner, entry.command.name(), None, result).await
    }

    /// The reacting member with their tier, `None` for unknown members
    async fn reacting_member(
        &self,
        user_id: &str,
    ) -> Result<Option<(Member, PermissionTier)>, BotError> {
        let Some(member) = self.platform.fetch_member(user_id).await? else {
            return Ok(None);
        };
        let tier = self.permissions.highest_tier(&member).await?;
        Ok(Some((member, tier)))
    }

    /// Run message streams in registration order. Returns true only if every
    /// stream that saw the message let it through.
    pub async fn dispatch_message_streams(&self, message: &ChatMessage) -> Result<bool, BotError> {
        let streams = self.tables().message_streams.clone();
        let mut proceed = true;

        for entry in streams {
            if let Some(channels) = entry.stream.channels() {
                if !channels.iter().any(|c| *c == message.channel_id) {
                    continue;
                }
            }

            let ctx = PluginContext::new(self, &entry.owner);
            match entry.stream.run(&ctx, message).await {
                Ok(vote) => proceed &= vote,
                Err(e) => {
                    self.settle(&entry.owner, entry.stream.name(), Some(&message.content), Err(e))
                        .await?
                }
            }
        }
        Ok(proceed)
    }

    pub async fn dispatch_member_joined(&self, member: &Member) -> Result<(), BotError> {
        let streams = self.tables().join_streams.clone();
        self.run_member_streams(streams, member).await
    }

    pub async fn dispatch_member_left(&self, member: &Member) -> Result<(), BotError> {
        let streams = self.tables().leave_streams.clone();
        self.run_member_streams(streams, member).await
    }

    async fn run_member_streams(
        &self,
        streams: Vec<Stream<dyn MemberStream>>,
        member: &Member,
    ) -> Result<(), BotError> {
        for entry in streams {
            let ctx = PluginContext::new(self, &entry.owner);
            let result = entry.stream.run(&ctx, member).await;
            self.settle(&entry.owner, entry.stream.name(), None, result).await?;
        }
        Ok(())
    }

    // ---- error reporting ----

    /// Turn a handler result into reports. Only fatal errors come back out.
    async fn settle(
        &self,
        owner: &str,
        name: &str,
        trigger: Option<&str>,
        result: Result<(), CommandError>,
    ) -> Result<(), BotError> {
        match result {
            Ok(()) => Ok(()),
            Err(CommandError::Critical(reason)) => {
                self.critical_plugin_error(owner, &reason).await;
                Ok(())
            }
            Err(CommandError::Bot(e)) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("Error while running {} of {}: {}", name, owner, e);
                self.report(&self.lang.uncaught_error(name, trigger)).await;
                Ok(())
            }
        }
    }

    /// Report a plugin that can no longer work, then take it down
    pub async fn critical_plugin_error(&self, plugin: &str, reason: &str) {
        error!("Critical error in plugin {}: {}", plugin, reason);
        self.report(&self.lang.critical_plugin_error(plugin, reason)).await;

        let _lifecycle = self.lifecycle.lock().await;
        self.mark_broken(plugin);
    }

    /// Send an operator-facing message to the control channel
    pub async fn report(&self, text: &str) {
        self.send_or_warn(&self.control_channel, text).await;
    }

    async fn send_or_warn(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.platform.send_message(channel_id, text).await {
            warn!("Failed to send to {}: {}", channel_id, e);
        }
    }

    /// Write all pending state to disk
    pub async fn flush(&self) -> Result<(), BotError> {
        self.state.flush().await?;
        let stores: Vec<Arc<PersistentStore>> =
            self.plugins().iter().filter_map(|p| p.store.clone()).collect();
        for store in stores {
            store.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{InputKind, Setting};
    use crate::infrastructure::adapters::console::ConsoleAdapter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const CONTROL: &str = "control";

    struct Echo;

    #[async_trait]
    impl ChatCommand for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn permission(&self) -> PermissionTier {
            PermissionTier::Any
        }

        async fn run(
            &self,
            ctx: &PluginContext<'_>,
            message: &ChatMessage,
            args: &[String],
        ) -> Result<(), CommandError> {
            ctx.send(&message.channel_id, &args.join(" ")).await?;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ChatCommand for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn permission(&self) -> PermissionTier {
            PermissionTier::Any
        }

        async fn run(
            &self,
            _ctx: &PluginContext<'_>,
            _message: &ChatMessage,
            _args: &[String],
        ) -> Result<(), CommandError> {
            Err(CommandError::Failed("boom".into()))
        }
    }

    struct Simple {
        name: &'static str,
        template: Vec<Setting>,
        inits: AtomicUsize,
        fail_init: bool,
    }

    impl Simple {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                template: Vec::new(),
                inits: AtomicUsize::new(0),
                fail_init: false,
            }
        }
    }

    #[async_trait]
    impl Plugin for Simple {
        fn name(&self) -> &str {
            self.name
        }

        fn setup_template(&self) -> Vec<Setting> {
            self.template.clone()
        }

        fn commands(&self) -> Vec<Command> {
            vec![Command::chat(Echo), Command::chat(Broken)]
        }

        async fn init(&self, _ctx: &PluginContext<'_>) -> Result<(), CommandError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(CommandError::Failed("init".into()));
            }
            Ok(())
        }
    }

    fn registry(dir: &TempDir) -> (Arc<ConsoleAdapter>, PluginRegistry) {
        let adapter = Arc::new(ConsoleAdapter::new("op", CONTROL));
        let mut config = Config::default();
        config.state.directory = dir.path().join("state");
        config.control_channel = CONTROL.to_string();
        let registry =
            PluginRegistry::new(&config, adapter.clone(), FatalSignal::detached()).unwrap();
        (adapter, registry)
    }

    #[tokio::test]
    async fn test_permissions_plugin_is_preloaded() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);

        assert_eq!(registry.names(), vec![PERMISSIONS_PLUGIN]);
        assert!(!registry.is_configured(PERMISSIONS_PLUGIN));
        assert!(registry.store_of(PERMISSIONS_PLUGIN).is_some());
    }

    #[tokio::test]
    async fn test_template_less_plugin_is_configured_on_load() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("simple"))).unwrap();

        assert!(registry.is_configured("simple"));
        assert!(!registry.is_active("simple"));
        assert!(registry.store_of("simple").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_load_rejected() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("simple"))).unwrap();

        let err = registry.load(Arc::new(Simple::new("simple"))).unwrap_err();
        assert!(matches!(err, BotError::Plugin(PluginError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_activate_registers_and_deactivate_removes() {
        let dir = TempDir::new().unwrap();
        let (adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("simple"))).unwrap();

        assert_eq!(registry.activate("simple").await.unwrap(), ActivationOutcome::Activated);
        assert!(registry.is_active("simple"));

        let msg = adapter.message_from("op", CONTROL, "!echo hi there").unwrap();
        registry.dispatch_chat_message(&msg).await.unwrap();
        assert_eq!(adapter.sent_to(CONTROL), vec!["hi there"]);

        assert!(registry.deactivate("simple").await);
        assert!(!registry.is_active("simple"));
        assert!(!registry.has_registrations("simple"));
        registry.dispatch_chat_message(&msg).await.unwrap();
        assert_eq!(adapter.sent_to(CONTROL).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_plugin() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);
        assert_eq!(registry.activate("nope").await.unwrap(), ActivationOutcome::NotFound);
        assert!(!registry.deactivate("nope").await);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_nothing_registered() {
        let dir = TempDir::new().unwrap();
        let (adapter, registry) = registry(&dir);
        let mut plugin = Simple::new("flaky");
        plugin.fail_init = true;
        registry.load(Arc::new(plugin)).unwrap();

        assert_eq!(registry.activate("flaky").await.unwrap(), ActivationOutcome::InitFailed);
        assert!(!registry.is_active("flaky"));
        assert!(!registry.has_registrations("flaky"));
        // not critical, so still configured
        assert!(registry.is_configured("flaky"));
        assert!(adapter.sent_to(CONTROL)[0].contains("Uncaught error while running flaky"));
    }

    #[tokio::test]
    async fn test_reactivation_restarts() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);
        let plugin = Arc::new(Simple::new("simple"));
        registry.load(plugin.clone()).unwrap();

        registry.activate("simple").await.unwrap();
        registry.activate("simple").await.unwrap();

        assert_eq!(plugin.inits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.visible_commands(PermissionTier::Any).0, vec!["broken", "echo"]);
    }

    #[tokio::test]
    async fn test_handler_error_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("simple"))).unwrap();
        registry.activate("simple").await.unwrap();

        let msg = adapter.message_from("op", CONTROL, "!broken now").unwrap();
        registry.dispatch_chat_message(&msg).await.unwrap();

        let sent = adapter.sent_to(CONTROL);
        assert_eq!(
            sent,
            vec!["Uncaught error while running broken! Exact command: !broken now"]
        );
        assert!(registry.is_active("simple"));
    }

    #[tokio::test]
    async fn test_critical_error_deactivates_and_unconfigures() {
        let dir = TempDir::new().unwrap();
        let (adapter, registry) = registry(&dir);
        let mut plugin = Simple::new("needs");
        plugin.template = vec![Setting::new("channel", InputKind::Channel)];
        registry.load(Arc::new(plugin)).unwrap();
        registry.state.write("needs", CONFIGURED, true);
        registry.activate("needs").await.unwrap();

        registry.critical_plugin_error("needs", "channel gone").await;

        assert!(!registry.is_active("needs"));
        assert!(!registry.is_configured("needs"));
        assert!(!registry.has_registrations("needs"));
        assert!(adapter.sent_to(CONTROL)[0].contains("Critical error in plugin needs"));
    }

    #[tokio::test]
    async fn test_initiate_all_restores_active_plugins() {
        let dir = TempDir::new().unwrap();
        {
            let (_adapter, registry) = registry(&dir);
            registry.load(Arc::new(Simple::new("simple"))).unwrap();
            registry.load(Arc::new(Simple::new("idle"))).unwrap();
            registry.activate("simple").await.unwrap();
            registry.flush().await.unwrap();
        }

        let (_adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("simple"))).unwrap();
        registry.load(Arc::new(Simple::new("idle"))).unwrap();
        assert!(!registry.has_registrations("simple"));

        assert_eq!(registry.initiate_all().await.unwrap(), 1);
        assert!(registry.has_registrations("simple"));
        assert!(!registry.is_active("idle"));
    }

    #[tokio::test]
    async fn test_activate_all_skips_unconfigured() {
        let dir = TempDir::new().unwrap();
        let (_adapter, registry) = registry(&dir);
        registry.load(Arc::new(Simple::new("a"))).unwrap();
        registry.load(Arc::new(Simple::new("b"))).unwrap();

        let outcomes = registry.activate_all().await.unwrap();
        let names: Vec<&str> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!registry.is_active(PERMISSIONS_PLUGIN));
    }
}
