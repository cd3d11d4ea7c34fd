//! Interactive input collection
//!
//! A query sends a prompt, then waits for the querying user's next message in
//! the same channel and parses it into the requested [`InputKind`]. Invalid
//! replies get feedback and a fresh wait; the cancel command and the timeout
//! end the query without an answer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::errors::BotError;
use crate::application::lang::Lang;
use crate::application::messaging::parser::{
    find_custom_emoji, find_last_unicode_emoji, split_list, MessageParser,
};
use crate::domain::entities::{
    Channel, ChatMessage, Emoji, InputKind, Member, MessageRef, Role, SettingValue,
};
use crate::domain::traits::Platform;
use crate::infrastructure::config::QueryConfig;

/// A parsed reply
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Id of a user, role or channel
    Id(String),
    Member(Member),
    Role(Role),
    Channel(Channel),
    Emoji(Emoji),
    Message(MessageRef),
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl Answer {
    /// Storable form of the answer
    pub fn to_setting_value(&self) -> SettingValue {
        match self {
            Answer::Id(id) => SettingValue::Text(id.clone()),
            Answer::Member(m) => SettingValue::Text(m.id.clone()),
            Answer::Role(r) => SettingValue::Text(r.id.clone()),
            Answer::Channel(c) => SettingValue::Text(c.id.clone()),
            Answer::Emoji(e) => SettingValue::Text(e.key().to_string()),
            Answer::Message(r) => {
                SettingValue::List(vec![r.channel_id.clone(), r.message_id.clone()])
            }
            Answer::Text(t) => SettingValue::Text(t.clone()),
            Answer::Number(n) => SettingValue::Number(*n),
            Answer::List(items) => SettingValue::List(items.clone()),
        }
    }
}

/// How a query ended
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered(Answer),
    Canceled,
    TimedOut,
}

impl QueryOutcome {
    pub fn into_answer(self) -> Option<Answer> {
        match self {
            QueryOutcome::Answered(answer) => Some(answer),
            _ => None,
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Return resolved members/roles/channels instead of their ids
    pub resolve: bool,
    /// Overrides the configured default timeout
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn ids() -> Self {
        Self::default()
    }

    pub fn resolved() -> Self {
        Self {
            resolve: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An open query. At most one exists per user.
#[derive(Debug)]
struct QuerySession {
    channel_id: String,
    kind: InputKind,
    deadline: Instant,
    replies: mpsc::UnboundedSender<ChatMessage>,
}

/// Removes the session when the query ends, however it ends
struct SessionGuard<'a> {
    sessions: &'a Mutex<HashMap<String, QuerySession>>,
    user_id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.user_id);
        debug!("Query for user {} closed", self.user_id);
    }
}

pub struct InputCollector {
    platform: Arc<dyn Platform>,
    parser: MessageParser,
    cancel_keyword: String,
    default_timeout: Duration,
    lang: Lang,
    sessions: Mutex<HashMap<String, QuerySession>>,
}

impl InputCollector {
    pub fn new(
        platform: Arc<dyn Platform>,
        prefix: impl Into<String>,
        config: &QueryConfig,
        lang: Lang,
    ) -> Self {
        Self {
            platform,
            parser: MessageParser::new(prefix),
            cancel_keyword: config.cancel_keyword.clone(),
            default_timeout: config.timeout(),
            lang,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, QuerySession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the user is currently answering a query
    pub fn is_in_query(&self, user_id: &str) -> bool {
        self.sessions().contains_key(user_id)
    }

    pub fn open_queries(&self) -> usize {
        self.sessions().len()
    }

    /// Hand an inbound message to the query waiting for it.
    ///
    /// Returns true if the message was a reply to an open query.
    pub fn deliver(&self, message: &ChatMessage) -> bool {
        let sessions = self.sessions();
        match sessions.get(&message.author.id) {
            Some(session) if session.channel_id == message.channel_id => {
                debug!(
                    "Reply from {} for {} query",
                    message.author.id, session.kind
                );
                session.replies.send(message.clone()).is_ok()
            }
            _ => false,
        }
    }

    /// Ask `user_id` in `channel_id` for a value of `kind`.
    ///
    /// Fails with [`BotError::AlreadyInQuery`] if the user already has an
    /// open query, and with a platform error if the prompt cannot be sent.
    pub async fn query(
        &self,
        channel_id: &str,
        user_id: &str,
        prompt: &str,
        kind: InputKind,
        options: QueryOptions,
    ) -> Result<QueryOutcome, BotError> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _guard = {
            let mut sessions = self.sessions();
            if sessions.contains_key(user_id) {
                return Err(BotError::AlreadyInQuery(user_id.to_string()));
            }
            sessions.insert(
                user_id.to_string(),
                QuerySession {
                    channel_id: channel_id.to_string(),
                    kind,
                    deadline: Instant::now() + timeout,
                    replies: tx,
                },
            );
            SessionGuard {
                sessions: &self.sessions,
                user_id: user_id.to_string(),
            }
        };

        info!("Querying user {} in {} for {}", user_id, channel_id, kind);
        self.platform.send_message(channel_id, prompt).await?;

        loop {
            let deadline = Instant::now() + timeout;
            if let Some(session) = self.sessions().get_mut(user_id) {
                session.deadline = deadline;
            }

            let reply = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(reply)) => reply,
                Ok(None) | Err(_) => {
                    info!("Query for user {} timed out", user_id);
                    self.notify(channel_id, &self.lang.timed_out()).await;
                    return Ok(QueryOutcome::TimedOut);
                }
            };

            if self.parser.is_cancel(&reply.content, &self.cancel_keyword) {
                info!("Query for user {} canceled", user_id);
                self.notify(channel_id, &self.lang.canceled()).await;
                return Ok(QueryOutcome::Canceled);
            }

            match self.parse_reply(&reply, kind, options.resolve).await {
                Ok(answer) => return Ok(QueryOutcome::Answered(answer)),
                Err(feedback) => self.notify(channel_id, &feedback).await,
            }
        }
    }

    /// Parse a reply, or return the feedback to send before retrying
    async fn parse_reply(
        &self,
        reply: &ChatMessage,
        kind: InputKind,
        resolve: bool,
    ) -> Result<Answer, String> {
        let content = reply.content.as_str();
        let raw = content.trim();

        match kind {
            InputKind::User => {
                let id = reply.mentions.users.first().map(String::as_str).unwrap_or(raw);
                match quietly(self.platform.fetch_member(id)).await {
                    Some(member) if resolve => Ok(Answer::Member(member)),
                    Some(member) => Ok(Answer::Id(member.id)),
                    None => Err(self.lang.wrong_input_user(raw)),
                }
            }

            InputKind::Role => {
                let id = reply.mentions.roles.first().map(String::as_str).unwrap_or(raw);
                match quietly(self.platform.fetch_role(id)).await {
                    Some(role) if resolve => Ok(Answer::Role(role)),
                    Some(role) => Ok(Answer::Id(role.id)),
                    None => Err(self.lang.wrong_input_role(raw)),
                }
            }

            InputKind::Channel => {
                let id = reply
                    .mentions
                    .channels
                    .first()
                    .map(String::as_str)
                    .unwrap_or(raw);
                match quietly(self.platform.fetch_channel(id)).await {
                    Some(channel) if resolve => Ok(Answer::Channel(channel)),
                    Some(channel) => Ok(Answer::Id(channel.id)),
                    None => Err(self.lang.wrong_input_channel(raw)),
                }
            }

            InputKind::Emoji => {
                if let Some(custom) = find_custom_emoji(content) {
                    // custom emojis must belong to the community
                    return quietly(self.platform.fetch_emoji(custom.key()))
                        .await
                        .map(Answer::Emoji)
                        .ok_or_else(|| self.lang.wrong_input_emoji());
                }
                find_last_unicode_emoji(content)
                    .map(|g| Answer::Emoji(Emoji::Unicode(g)))
                    .ok_or_else(|| self.lang.wrong_input_emoji())
            }

            InputKind::Message => Ok(Answer::Message(reply.reference())),

            InputKind::Text => Ok(Answer::Text(content.to_string())),

            InputKind::Number => raw
                .parse::<i64>()
                .map(Answer::Number)
                .map_err(|_| self.lang.wrong_input_number(raw)),

            InputKind::TextList => Ok(Answer::List(content.lines().map(String::from).collect())),

            InputKind::ChannelList => Ok(Answer::List(split_list(content, &["<#", ">"]))),

            InputKind::RoleList => Ok(Answer::List(split_list(content, &["<@&", ">"]))),
        }
    }

    async fn notify(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.platform.send_message(channel_id, text).await {
            warn!("Failed to send query feedback to {}: {}", channel_id, e);
        }
    }
}

/// Lookups that fail are treated like lookups that find nothing
async fn quietly<T>(lookup: impl Future<Output = Result<Option<T>, BotError>>) -> Option<T> {
    match lookup.await {
        Ok(found) => found,
        Err(e) => {
            debug!("Lookup failed: {}", e);
            None
        }
    }
}
