//! Built-in commands: `help`, `plugin` and `config`
//!
//! These only use the registry's public operations.

use async_trait::async_trait;

use crate::application::errors::CommandError;
use crate::application::lang::Lang;
use crate::application::messaging::parser::find_custom_emoji;
use crate::domain::entities::{ChatCommand, ChatMessage, Command, PermissionTier};
use crate::plugins::manager::{ActivationOutcome, ConfigureOutcome, PluginRegistry};
use crate::plugins::trait_def::{Plugin, PluginContext};

pub const BUILTIN_PLUGIN: &str = "builtin-commands";

pub struct BuiltinCommands {
    lang: Lang,
}

impl BuiltinCommands {
    pub fn new(lang: Lang) -> Self {
        Self { lang }
    }
}

#[async_trait]
impl Plugin for BuiltinCommands {
    fn name(&self) -> &str {
        BUILTIN_PLUGIN
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::chat(HelpCommand),
            Command::chat(PluginCommand {
                help: self.lang.plugin_command_help(),
            }),
            Command::chat(ConfigCommand {
                help: self.lang.config_help(),
            }),
        ]
    }
}

pub struct HelpCommand;

#[async_trait]
impl ChatCommand for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn permission(&self) -> PermissionTier {
        PermissionTier::Any
    }

    fn help_text(&self) -> String {
        "I heard you like help, so I got you some help for your help".to_string()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<(), CommandError> {
        let registry = ctx.registry();
        let tier = registry.permissions().highest_tier(&message.author).await?;

        if let Some(wanted) = args.first() {
            if let Some(text) = help_for(registry, wanted, tier) {
                ctx.send(&message.channel_id, &text).await?;
                return Ok(());
            }
        }

        let (chat, emoji) = registry.visible_commands(tier);
        ctx.send(&message.channel_id, &ctx.lang().command_list(&chat, &emoji))
            .await?;
        Ok(())
    }
}

/// Help text of a chat command or emoji trigger visible at `tier`
fn help_for(registry: &PluginRegistry, wanted: &str, tier: PermissionTier) -> Option<String> {
    let name = wanted.strip_prefix(registry.parser().prefix()).unwrap_or(wanted);
    if let Some(entry) = registry.chat_command(name) {
        return (entry.command.permission() <= tier).then(|| entry.command.help_text());
    }

    let key = find_custom_emoji(wanted)
        .map(|e| e.key().to_string())
        .unwrap_or_else(|| wanted.to_string());
    registry
        .emoji_command(&key)
        .filter(|entry| entry.command.permission() <= tier)
        .map(|entry| entry.command.help_text())
}

pub struct PluginCommand {
    help: String,
}

#[async_trait]
impl ChatCommand for PluginCommand {
    fn name(&self) -> &str {
        "plugin"
    }

    fn help_text(&self) -> String {
        self.help.clone()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<(), CommandError> {
        let registry = ctx.registry();
        let lang = ctx.lang();
        let channel = message.channel_id.as_str();
        let sub = args.first().map(|s| s.to_lowercase());
        let target = args.get(1).map(String::as_str);

        match (sub.as_deref(), target) {
            (Some("list"), _) => {
                let statuses = registry.statuses();
                let entries: Vec<_> = statuses.iter().map(|s| s.as_list_entry()).collect();
                ctx.send(channel, &lang.plugin_list(&entries)).await?;
            }

            (Some("activate"), Some("all")) => {
                ctx.send(channel, &lang.activate_all()).await?;
                for (name, outcome) in registry.activate_all().await? {
                    if outcome == ActivationOutcome::Activated {
                        ctx.send(channel, &lang.plugin_activated(&name)).await?;
                    }
                }
            }

            (Some("activate"), Some(name)) => {
                let text = match registry.activate(name).await? {
                    ActivationOutcome::NotFound => lang.plugin_not_found(name),
                    ActivationOutcome::NotConfigured => lang.plugin_not_configured(name),
                    ActivationOutcome::Activated => lang.plugin_activated(name),
                    ActivationOutcome::InitFailed => lang.plugin_activation_failed(name),
                };
                ctx.send(channel, &text).await?;
            }

            (Some("deactivate"), Some(name)) => {
                let text = if registry.deactivate(name).await {
                    lang.plugin_deactivated(name)
                } else {
                    lang.plugin_not_found(name)
                };
                ctx.send(channel, &text).await?;
            }

            (Some("commands"), Some(name)) => {
                let text = match registry.plugin_commands(name) {
                    Some((chat, emoji)) => lang.plugin_command_list(name, &chat, &emoji),
                    None => lang.plugin_not_found(name),
                };
                ctx.send(channel, &text).await?;
            }

            _ => {
                ctx.send(channel, &self.help).await?;
            }
        }
        Ok(())
    }
}

pub struct ConfigCommand {
    help: String,
}

#[async_trait]
impl ChatCommand for ConfigCommand {
    fn name(&self) -> &str {
        "config"
    }

    fn help_text(&self) -> String {
        self.help.clone()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        message: &ChatMessage,
        args: &[String],
    ) -> Result<(), CommandError> {
        let lang = ctx.lang();
        let channel = message.channel_id.as_str();

        match args.first().map(String::as_str) {
            None => {
                ctx.send(channel, &self.help).await?;
            }
            Some("all") => configure_all(ctx, message).await?,
            Some(name) => {
                let outcome = ctx
                    .registry()
                    .configure(name, channel, &message.author.id)
                    .await?;
                let text = match outcome {
                    ConfigureOutcome::NotFound => lang.plugin_not_found(name),
                    ConfigureOutcome::NoTemplate => lang.no_config(name),
                    // the collector already said why
                    ConfigureOutcome::Aborted => return Ok(()),
                    ConfigureOutcome::Configured { restarted: false } => lang.config_done(name),
                    ConfigureOutcome::Configured { restarted: true } => lang.config_applied(name),
                };
                ctx.send(channel, &text).await?;
            }
        }
        Ok(())
    }
}

/// Configure every unconfigured plugin in load order, stopping at the first
/// abort
async fn configure_all(ctx: &PluginContext<'_>, message: &ChatMessage) -> Result<(), CommandError> {
    let registry = ctx.registry();
    let lang = ctx.lang();
    let channel = message.channel_id.as_str();

    let pending: Vec<String> = registry
        .statuses()
        .into_iter()
        .filter(|s| s.has_template && !s.configured)
        .map(|s| s.name)
        .collect();

    if pending.is_empty() {
        ctx.send(channel, &lang.no_unconfigured()).await?;
        return Ok(());
    }

    for name in pending {
        ctx.send(channel, &lang.now_configuring(&name)).await?;
        let outcome = registry.configure(&name, channel, &message.author.id).await?;
        if outcome == ConfigureOutcome::Aborted {
            return Ok(());
        }
    }

    ctx.send(channel, &lang.all_complete()).await?;
    Ok(())
}
