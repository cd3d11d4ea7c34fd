//! Event dispatcher - Routes platform events to the plugin registry
//!
//! Each event is handled on its own task so a command waiting for query
//! replies never holds up other events, including those replies.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::application::errors::BotError;
use crate::domain::entities::{ChatMessage, Reaction};
use crate::domain::traits::PlatformEvent;
use crate::plugins::PluginRegistry;

pub struct EventDispatcher {
    registry: Arc<PluginRegistry>,
    bot_id: String,
}

impl EventDispatcher {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        let bot_id = registry.platform().bot_info().id;
        Self { registry, bot_id }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Serve events until the transport closes or a fatal error is raised
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<PlatformEvent>,
        mut fatal: mpsc::UnboundedReceiver<BotError>,
    ) -> Result<(), BotError> {
        info!("Dispatching events");
        loop {
            tokio::select! {
                Some(err) = fatal.recv() => {
                    error!("Stopping after fatal error: {}", err);
                    return Err(err);
                }
                event = events.recv() => match event {
                    Some(event) => self.spawn(event),
                    None => {
                        info!("Event stream closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    fn spawn(&self, event: PlatformEvent) {
        let registry = Arc::clone(&self.registry);
        let bot_id = self.bot_id.clone();
        tokio::spawn(async move {
            if let Err(e) = contain(handle_event(&registry, &bot_id, event).await) {
                registry.fatal().raise(e);
            }
        });
    }

    /// Handle one event to completion. Only fatal errors are returned.
    pub async fn handle(&self, event: PlatformEvent) -> Result<(), BotError> {
        contain(handle_event(&self.registry, &self.bot_id, event).await)
    }
}

/// Log non-fatal errors and keep serving; fatal ones are passed on
fn contain(result: Result<(), BotError>) -> Result<(), BotError> {
    match result {
        Err(e) if !e.is_fatal() => {
            error!("Error while handling event: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Plugin errors are reported by the registry; what comes out of here is
/// either fatal or a transport failure outside any plugin
async fn handle_event(
    registry: &PluginRegistry,
    bot_id: &str,
    event: PlatformEvent,
) -> Result<(), BotError> {
    match event {
        PlatformEvent::MessageCreated(message) => handle_message(registry, &message).await,
        PlatformEvent::ReactionAdded { reaction, user_id } => {
            handle_reaction(registry, bot_id, &reaction, &user_id).await
        }
        PlatformEvent::MemberJoined(member) => {
            debug!("Member joined: {}", member.id);
            registry.dispatch_member_joined(&member).await
        }
        PlatformEvent::MemberLeft(member) => {
            debug!("Member left: {}", member.id);
            registry.dispatch_member_left(&member).await
        }
    }
}

async fn handle_message(registry: &PluginRegistry, message: &ChatMessage) -> Result<(), BotError> {
    if message.author.is_bot {
        return Ok(());
    }

    let answered_query = registry.collector().deliver(message);
    let proceed = registry.dispatch_message_streams(message).await?;
    if proceed && !answered_query {
        registry.dispatch_chat_message(message).await?;
    }
    Ok(())
}

async fn handle_reaction(
    registry: &PluginRegistry,
    bot_id: &str,
    reaction: &Reaction,
    user_id: &str,
) -> Result<(), BotError> {
    if user_id == bot_id {
        return Ok(());
    }
    registry.dispatch_reaction(reaction, user_id).await
}
