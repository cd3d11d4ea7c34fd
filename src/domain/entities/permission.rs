use serde::{Deserialize, Serialize};
use std::fmt;

/// Bot authority levels, in ascending order.
///
/// `Any` is granted to everyone. `Admin` maps to the platform's native
/// administrator capability. The middle tiers are backed by roles recorded
/// through the `permissions` plugin and can be switched off in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionTier {
    Any,
    User,
    ChatMod,
    Mod,
    Admin,
}

impl PermissionTier {
    /// Tiers that are satisfied by a configured role
    pub const ROLE_BACKED: [PermissionTier; 3] =
        [PermissionTier::User, PermissionTier::ChatMod, PermissionTier::Mod];

    pub fn is_role_backed(&self) -> bool {
        Self::ROLE_BACKED.contains(self)
    }

    /// Key under which the tier's role id is stored
    pub fn config_key(&self) -> &'static str {
        match self {
            PermissionTier::Any => "Any",
            PermissionTier::User => "User",
            PermissionTier::ChatMod => "ChatMod",
            PermissionTier::Mod => "Mod",
            PermissionTier::Admin => "Admin",
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionTier::Any => "any",
            PermissionTier::User => "user",
            PermissionTier::ChatMod => "chat-mod",
            PermissionTier::Mod => "mod",
            PermissionTier::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}
