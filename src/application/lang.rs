//! User-facing text

use crate::domain::entities::PermissionTier;

/// Row of the `plugin list` output
pub struct PluginListEntry<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub active: bool,
    pub configured: bool,
}

/// Message catalogue, parameterized by the command prefix
#[derive(Debug, Clone)]
pub struct Lang {
    prefix: String,
    cancel: String,
}

impl Lang {
    pub fn new(prefix: impl Into<String>, cancel_keyword: &str) -> Self {
        let prefix = prefix.into();
        let cancel = format!("{}{}", prefix, cancel_keyword);
        Self { prefix, cancel }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    // ---- input collection ----

    pub fn wrong_input_user(&self, input: &str) -> String {
        format!(
            "I could not find a user with the id {}.\nPlease send an id, or @mention the user.\n\nYou can abort with \"{}\"",
            input, self.cancel
        )
    }

    pub fn wrong_input_role(&self, input: &str) -> String {
        format!(
            "I could not find a role with the id {}.\nPlease send an id, or @mention the role.\n\nYou can abort with \"{}\"",
            input, self.cancel
        )
    }

    pub fn wrong_input_channel(&self, input: &str) -> String {
        format!(
            "I could not find a channel with the id {}.\nPlease send an id, or link the channel with #.\n\nYou can abort with \"{}\"",
            input, self.cancel
        )
    }

    pub fn wrong_input_emoji(&self) -> String {
        format!(
            "I could not find that emoji on the server.\nPlease send the emoji itself.\n\nYou can abort with \"{}\"",
            self.cancel
        )
    }

    pub fn wrong_input_number(&self, input: &str) -> String {
        format!(
            "\"{}\" is not a whole number.\n\nYou can abort with \"{}\"",
            input, self.cancel
        )
    }

    pub fn wrong_input_text(&self) -> String {
        format!(
            "Please answer with a text message.\n\nYou can abort with \"{}\"",
            self.cancel
        )
    }

    pub fn timed_out(&self) -> String {
        "Time for input ran out. Please run the command again".to_string()
    }

    pub fn canceled(&self) -> String {
        "Input canceled".to_string()
    }

    // ---- permissions ----

    pub fn role_not_set(&self, tier: PermissionTier) -> String {
        format!(
            "The role for the {} permission is not set, or no longer exists.\nPlease configure the roles with \"{}config permissions\"",
            tier, self.prefix
        )
    }

    pub fn tier_role_prompt(&self, tier: PermissionTier) -> String {
        match tier {
            PermissionTier::User => "Role for regular users".to_string(),
            PermissionTier::ChatMod => {
                "Role for chat moderators (can use chat moderation commands)".to_string()
            }
            PermissionTier::Mod => "Role for moderators (can use all mod commands)".to_string(),
            other => format!("Role for the {} permission", other),
        }
    }

    pub fn user_channel_prompt(&self) -> String {
        "Channel in which users may send commands".to_string()
    }

    pub fn insufficient_permission(&self, command: &str) -> String {
        format!("You are not allowed to use {}{}", self.prefix, command)
    }

    // ---- error reports ----

    pub fn uncaught_error(&self, name: &str, command: Option<&str>) -> String {
        match command {
            Some(text) => format!("Uncaught error while running {}! Exact command: {}", name, text),
            None => format!("Uncaught error while running {}!", name),
        }
    }

    pub fn critical_plugin_error(&self, plugin: &str, reason: &str) -> String {
        format!(
            "Critical error in plugin {}!\n{}\nDeactivating plugin. Reconfigure it with \"{}config {}\"",
            plugin, reason, self.prefix, plugin
        )
    }

    pub fn missing_setting(&self, setting: &str) -> String {
        format!("Could not access setting {}", setting)
    }

    pub fn vanished_setting(&self, kind: &str, id: &str) -> String {
        format!(
            "Could not find any {} with the id {} on the server. Maybe it no longer exists?",
            kind, id
        )
    }

    // ---- built-in commands ----

    pub fn plugin_activated(&self, name: &str) -> String {
        format!("Plugin {} activated!", name)
    }

    pub fn plugin_deactivated(&self, name: &str) -> String {
        format!("Plugin {} deactivated!", name)
    }

    pub fn plugin_activation_failed(&self, name: &str) -> String {
        format!("Plugin {} failed to initialize and stays inactive", name)
    }

    pub fn plugin_not_configured(&self, name: &str) -> String {
        format!(
            "Cannot activate plugin {} because it is not configured.\nUse \"{}config {}\" to configure it",
            name, self.prefix, name
        )
    }

    pub fn plugin_not_found(&self, name: &str) -> String {
        format!("No plugin named {} found", name)
    }

    pub fn activate_all(&self) -> String {
        "Activating all configured plugins".to_string()
    }

    pub fn plugin_command_help(&self) -> String {
        let p = &self.prefix;
        format!(
            "\"{p}plugin list\" list all installed plugins\n\
             \"{p}plugin activate [name]\" activate a plugin\n\
             \"{p}plugin deactivate [name]\" deactivate a plugin\n\
             \"{p}plugin activate all\" activate all plugins\n\
             \"{p}plugin commands [name]\" show the commands of a plugin\n\n\
             Plugins have to be configured before they can be activated:\n\
             \"{p}config [name]\" configure a plugin"
        )
    }

    pub fn plugin_list(&self, entries: &[PluginListEntry<'_>]) -> String {
        let mut msg = "The following plugins are installed:\n".to_string();
        for entry in entries {
            let status = if entry.active {
                "active"
            } else if entry.configured {
                "inactive"
            } else {
                "unconfigured"
            };
            msg.push_str(&format!(
                "\n{} | {} | {}\n--------",
                entry.name,
                entry.description.unwrap_or(""),
                status
            ));
        }
        msg
    }

    pub fn plugin_command_list(&self, plugin: &str, chat: &[String], emoji: &[String]) -> String {
        let mut list = format!("The following commands belong to the plugin \"{}\":\n", plugin);
        for name in chat {
            list.push_str(&format!("\n{}{}", self.prefix, name));
        }
        for emoji in emoji {
            list.push_str(&format!("\n{}", emoji));
        }
        list.push_str(&format!(
            "\n\nUse \"{}help [command]\" to learn more about a command",
            self.prefix
        ));
        list
    }

    pub fn command_list(&self, chat: &[String], emoji: &[String]) -> String {
        let mut list = "The following commands are available to you:\n".to_string();
        for name in chat {
            list.push_str(&format!("\n{}{}", self.prefix, name));
        }
        for emoji in emoji {
            list.push_str(&format!("\n{}", emoji));
        }
        list.push_str(&format!(
            "\n\nUse \"{}help [command]\" to learn more about a command",
            self.prefix
        ));
        list
    }

    pub fn help_help(&self) -> String {
        format!("\"{}help [command]\" shows what a command does", self.prefix)
    }

    pub fn config_help(&self) -> String {
        let p = &self.prefix;
        format!(
            "Use this command to configure plugins.\n\
             \"{p}config [plugin]\" configure a plugin\n\
             \"{p}config all\" configure all unconfigured plugins\n\n\
             or \"{p}plugin list\" to see all plugins"
        )
    }

    pub fn no_config(&self, plugin: &str) -> String {
        format!(
            "This plugin does not need to be configured.\nUse \"{}plugin activate {}\" to activate it",
            self.prefix, plugin
        )
    }

    pub fn config_done(&self, plugin: &str) -> String {
        format!(
            "Configuration of {} complete!\nUse \"{}plugin activate {}\" to activate the plugin",
            plugin, self.prefix, plugin
        )
    }

    pub fn config_applied(&self, plugin: &str) -> String {
        format!("Configuration of {} complete! The plugin was restarted", plugin)
    }

    pub fn no_unconfigured(&self) -> String {
        format!(
            "There are no unconfigured plugins.\nUse \"{}config [plugin]\" to reconfigure a specific plugin",
            self.prefix
        )
    }

    pub fn now_configuring(&self, plugin: &str) -> String {
        format!("Now configuring plugin: {}", plugin)
    }

    pub fn all_complete(&self) -> String {
        format!(
            "All plugins configured!\nUse \"{}plugin activate all\" to activate all plugins",
            self.prefix
        )
    }
}
