//! Permission resolution - maps members to their highest tier

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::application::errors::BotError;
use crate::application::lang::Lang;
use crate::domain::entities::{Member, PermissionTier};
use crate::domain::traits::Platform;
use crate::infrastructure::storage::PersistentStore;

/// Namespace holding the configured role ids, keyed by [`PermissionTier::config_key`]
pub const PERMISSIONS_NAMESPACE: &str = "config";

/// Key of the channel in which `user`-tier commands are accepted
pub const USER_COMMAND_CHANNEL: &str = "UserCommandChannel";

pub struct PermissionResolver {
    platform: Arc<dyn Platform>,
    control_channel: String,
    /// enabled role-backed tiers, highest first
    tiers: Vec<PermissionTier>,
    store: Arc<PersistentStore>,
    lang: Lang,
    notified: Mutex<HashSet<PermissionTier>>,
    control_channel_found: AtomicBool,
}

impl PermissionResolver {
    pub fn new(
        platform: Arc<dyn Platform>,
        control_channel: impl Into<String>,
        tiers: Vec<PermissionTier>,
        store: Arc<PersistentStore>,
        lang: Lang,
    ) -> Self {
        Self {
            platform,
            control_channel: control_channel.into(),
            tiers,
            store,
            lang,
            notified: Mutex::new(HashSet::new()),
            control_channel_found: AtomicBool::new(false),
        }
    }

    pub fn role_tiers(&self) -> &[PermissionTier] {
        &self.tiers
    }

    pub fn is_enabled(&self, tier: PermissionTier) -> bool {
        !tier.is_role_backed() || self.tiers.contains(&tier)
    }

    /// Role id recorded for a tier, if any
    pub fn role_for(&self, tier: PermissionTier) -> Option<String> {
        self.store
            .read_as::<String>(PERMISSIONS_NAMESPACE, tier.config_key())
    }

    pub fn user_command_channel(&self) -> Option<String> {
        self.store
            .read_as::<String>(PERMISSIONS_NAMESPACE, USER_COMMAND_CHANNEL)
    }

    /// Forget which missing roles were already reported
    pub fn reset_notices(&self) {
        self.notified.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Look the control channel up until it has been found once.
    ///
    /// A missing channel is fatal, since missing-role notices would have
    /// nowhere to go. Transport errors are passed on as they are.
    pub async fn check_control_channel(&self) -> Result<(), BotError> {
        if self.control_channel_found.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.platform.fetch_channel(&self.control_channel).await? {
            Some(_) => {
                self.control_channel_found.store(true, Ordering::Release);
                Ok(())
            }
            None => Err(BotError::Fatal(format!(
                "control channel {} not found",
                self.control_channel
            ))),
        }
    }

    /// Highest tier the member holds
    pub async fn highest_tier(&self, member: &Member) -> Result<PermissionTier, BotError> {
        self.check_control_channel().await?;

        if member.administrator {
            return Ok(PermissionTier::Admin);
        }

        for &tier in &self.tiers {
            let role = match self.role_for(tier) {
                Some(id) => self.platform.fetch_role(&id).await?,
                None => None,
            };

            match role {
                Some(role) => {
                    if member.has_role(&role.id) {
                        debug!("Member {} holds {} via role {}", member.id, tier, role.id);
                        return Ok(tier);
                    }
                }
                None => self.notify_missing(tier).await,
            }
        }

        Ok(PermissionTier::Any)
    }

    async fn notify_missing(&self, tier: PermissionTier) {
        let first = self
            .notified
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tier);
        if !first {
            return;
        }

        warn!("Role for the {} permission is not set", tier);
        if let Err(e) = self
            .platform
            .send_message(&self.control_channel, &self.lang.role_not_set(tier))
            .await
        {
            warn!("Failed to report missing role: {}", e);
        }
    }
}
