//! Application layer errors

use thiserror::Error;
use tokio::sync::mpsc;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("User {0} is already answering a query")]
    AlreadyInQuery(String),

    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Errors that must stop the process: storage failures and an
    /// unreachable control channel
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Fatal(_) | BotError::Storage(_))
    }
}

/// Errors a command, stream or init hook may return
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Execution failed: {0}")]
    Failed(String),

    /// The plugin can no longer work, e.g. a configured channel vanished
    #[error("Critical plugin failure: {0}")]
    Critical(String),

    #[error(transparent)]
    Bot(#[from] BotError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt state file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Plugin table errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin '{0}' already loaded")]
    Duplicate(String),
}

/// Handle used to stop the process on unrecoverable conditions.
///
/// Clones share one receiver, owned by the event loop. A detached signal
/// only logs, which is what tests and one-off tools want.
#[derive(Clone, Debug)]
pub struct FatalSignal {
    sender: Option<mpsc::UnboundedSender<BotError>>,
}

impl FatalSignal {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// Log the error and ask the event loop to shut down
    pub fn raise(&self, error: BotError) {
        tracing::error!("CRITICAL ERROR: {}", error);
        if let Some(sender) = &self.sender {
            let _ = sender.send(error);
        }
    }
}
