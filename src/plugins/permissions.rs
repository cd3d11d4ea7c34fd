//! The `permissions` plugin - records which roles grant which tier
//!
//! It has no commands. Its only purpose is the setup template, whose
//! answers the permission resolver reads.

use async_trait::async_trait;

use crate::application::lang::Lang;
use crate::application::services::permission_service::USER_COMMAND_CHANNEL;
use crate::domain::entities::{InputKind, PermissionTier, Setting};
use crate::plugins::trait_def::Plugin;

pub const PERMISSIONS_PLUGIN: &str = "permissions";

pub struct PermissionsPlugin {
    template: Vec<Setting>,
}

impl PermissionsPlugin {
    /// `tiers` are the enabled role-backed tiers, highest first
    pub fn new(tiers: Vec<PermissionTier>, lang: &Lang) -> Self {
        let mut template: Vec<Setting> = tiers
            .iter()
            .map(|&tier| {
                Setting::new(tier.config_key(), InputKind::Role)
                    .with_prompt(lang.tier_role_prompt(tier))
            })
            .collect();

        if tiers.contains(&PermissionTier::User) {
            template.push(
                Setting::new(USER_COMMAND_CHANNEL, InputKind::Channel)
                    .with_prompt(lang.user_channel_prompt()),
            );
        }

        Self { template }
    }
}

#[async_trait]
impl Plugin for PermissionsPlugin {
    fn name(&self) -> &str {
        PERMISSIONS_PLUGIN
    }

    fn description(&self) -> Option<&str> {
        Some("Roles granting each permission level")
    }

    fn setup_template(&self) -> Vec<Setting> {
        self.template.clone()
    }
}
