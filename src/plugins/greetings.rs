//! Greets new members after a configurable delay

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::CommandError;
use crate::domain::entities::{
    ChatCommand, ChatMessage, Command, InputKind, Member, PermissionTier, Setting,
};
use crate::plugins::trait_def::{MemberStream, Plugin, PluginContext};

const JOIN_CHANNEL: &str = "join_channel";
const INTRO_CHANNEL: &str = "intro_channel";
const RULE_CHANNEL: &str = "rule_channel";
const DELAY: &str = "timeout";

pub struct GreetingsPlugin {
    join: Arc<JoinGreeting>,
}

impl GreetingsPlugin {
    pub fn new() -> Self {
        Self {
            join: Arc::new(JoinGreeting),
        }
    }
}

impl Default for GreetingsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for GreetingsPlugin {
    fn name(&self) -> &str {
        "greetings"
    }

    fn description(&self) -> Option<&str> {
        Some("Greets new members")
    }

    fn setup_template(&self) -> Vec<Setting> {
        vec![
            Setting::new(JOIN_CHANNEL, InputKind::Channel)
                .with_prompt("Channel in which new members are greeted"),
            Setting::new(INTRO_CHANNEL, InputKind::Channel)
                .with_prompt("Channel where new members introduce themselves"),
            Setting::new(RULE_CHANNEL, InputKind::Channel)
                .with_prompt("Channel with the community rules"),
            Setting::new(DELAY, InputKind::Number)
                .with_prompt("How many seconds to wait before greeting a new member"),
        ]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::chat(GreetCommand)]
    }

    fn join_stream(&self) -> Option<Arc<dyn MemberStream>> {
        Some(self.join.clone())
    }

    async fn init(&self, ctx: &PluginContext<'_>) -> Result<(), CommandError> {
        // fail activation early if anything configured is gone
        Greeting::load(ctx).await?;
        Ok(())
    }
}

/// Resolved settings of the plugin
struct Greeting {
    join_channel: String,
    intro_channel: String,
    rule_channel: String,
    delay: Duration,
}

impl Greeting {
    async fn load(ctx: &PluginContext<'_>) -> Result<Self, CommandError> {
        let delay = ctx.number_setting(DELAY)?;
        let delay = u64::try_from(delay).map_err(|_| {
            CommandError::Critical(format!("{} must not be negative, got {}", DELAY, delay))
        })?;

        Ok(Self {
            join_channel: ctx.channel_setting(JOIN_CHANNEL).await?.id,
            intro_channel: ctx.channel_setting(INTRO_CHANNEL).await?.id,
            rule_channel: ctx.channel_setting(RULE_CHANNEL).await?.id,
            delay: Duration::from_secs(delay),
        })
    }

    fn text(&self, member_id: &str) -> String {
        format!(
            "Welcome <@{}>! Please read the <#{}> and then introduce yourself in <#{}>. \
             A moderator will unlock the other channels for you as soon as possible.",
            member_id, self.rule_channel, self.intro_channel
        )
    }
}

struct JoinGreeting;

#[async_trait]
impl MemberStream for JoinGreeting {
    fn name(&self) -> &str {
        "join_greeting"
    }

    async fn run(&self, ctx: &PluginContext<'_>, member: &Member) -> Result<(), CommandError> {
        if member.is_bot {
            return Ok(());
        }

        let greeting = Greeting::load(ctx).await?;
        let platform = Arc::clone(ctx.platform());
        let text = greeting.text(&member.id);

        tokio::spawn(async move {
            tokio::time::sleep(greeting.delay).await;
            if let Err(e) = platform.send_message(&greeting.join_channel, &text).await {
                tracing::warn!("Failed to greet new member: {}", e);
            }
        });
        Ok(())
    }
}

/// Repeat the greeting for mentioned members, or the author
struct GreetCommand;

#[async_trait]
impl ChatCommand for GreetCommand {
    fn name(&self) -> &str {
        "greet"
    }

    fn permission(&self) -> PermissionTier {
        PermissionTier::User
    }

    fn help_text(&self) -> String {
        "Shows the welcome message again. Mention members to greet them instead".to_string()
    }

    async fn run(
        &self,
        ctx: &PluginContext<'_>,
        message: &ChatMessage,
        _args: &[String],
    ) -> Result<(), CommandError> {
        let greeting = Greeting::load(ctx).await?;

        let targets: Vec<&str> = if message.mentions.users.is_empty() {
            vec![message.author.id.as_str()]
        } else {
            message.mentions.users.iter().map(String::as_str).collect()
        };

        for id in targets {
            ctx.send(&message.channel_id, &greeting.text(id)).await?;
        }
        Ok(())
    }
}
