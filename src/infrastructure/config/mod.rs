//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::domain::entities::PermissionTier;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    /// Channel used for operator-facing status and error reports
    pub control_channel: String,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateConfig {
    pub directory: PathBuf,
    pub suffix: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./state"),
            suffix: ".state.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryConfig {
    pub timeout_secs: u64,
    pub long_timeout_secs: u64,
    /// Typed after the command prefix to abort an open query
    pub cancel_keyword: String,
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn long_timeout(&self) -> Duration {
        Duration::from_secs(self.long_timeout_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            long_timeout_secs: 900,
            cancel_keyword: "cancel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PermissionsConfig {
    /// Role-backed tiers in use. `any` and `admin` are always present.
    pub tiers: Vec<PermissionTier>,
}

impl PermissionsConfig {
    /// Enabled role-backed tiers, highest first
    pub fn role_tiers_descending(&self) -> Vec<PermissionTier> {
        let mut tiers: Vec<PermissionTier> = self
            .tiers
            .iter()
            .copied()
            .filter(|t| t.is_role_backed())
            .collect();
        tiers.sort_unstable_by(|a, b| b.cmp(a));
        tiers.dedup();
        tiers
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                PermissionTier::User,
                PermissionTier::ChatMod,
                PermissionTier::Mod,
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdaptersConfig {
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Id the console operator posts as
    pub operator_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "herald-bot".to_string(),
                prefix: "!".to_string(),
            },
            control_channel: "control".to_string(),
            state: StateConfig::default(),
            query: QueryConfig::default(),
            permissions: PermissionsConfig::default(),
            adapters: AdaptersConfig {
                console: Some(ConsoleConfig {
                    enabled: true,
                    operator_id: "operator".to_string(),
                }),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.prefix".to_string()));
        }
        if self.control_channel.trim().is_empty() {
            return Err(ConfigError::MissingField("control-channel".to_string()));
        }
        if self.query.timeout_secs == 0 || self.query.long_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "query timeouts must be greater than zero".to_string(),
            ));
        }
        if self.query.cancel_keyword.trim().is_empty() {
            return Err(ConfigError::MissingField("query.cancel-keyword".to_string()));
        }
        Ok(())
    }

    /// Full text a user types to cancel a query, e.g. `!cancel`
    pub fn cancel_command(&self) -> String {
        format!("{}{}", self.bot.prefix, self.query.cancel_keyword)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            config.bot.prefix = prefix;
        }

        if let Ok(channel) = std::env::var("CONTROL_CHANNEL") {
            config.control_channel = channel;
        }

        if let Ok(dir) = std::env::var("STATE_DIR") {
            config.state.directory = PathBuf::from(dir);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "bot:\n  name: test\n  prefix: \"?\"\ncontrol-channel: \"900\"\n",
        )
        .unwrap();

        assert_eq!(config.control_channel, "900");
        assert_eq!(config.query.timeout(), Duration::from_secs(300));
        assert_eq!(config.query.long_timeout(), Duration::from_secs(900));
        assert_eq!(config.cancel_command(), "?cancel");
        assert_eq!(config.state.suffix, ".state.json");
    }

    #[test]
    fn test_missing_control_channel_rejected() {
        let result = Config::from_yaml("bot:\n  name: test\n  prefix: \"!\"\ncontrol-channel: \"\"\n");
        assert!(matches!(result, Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn test_role_tiers_sorted_descending() {
        let permissions = PermissionsConfig {
            tiers: vec![
                PermissionTier::User,
                PermissionTier::Admin,
                PermissionTier::Mod,
                PermissionTier::User,
            ],
        };
        assert_eq!(
            permissions.role_tiers_descending(),
            vec![PermissionTier::Mod, PermissionTier::User]
        );
    }

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.permissions.tiers.len(), 3);
    }
}
