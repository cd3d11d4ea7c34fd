//! Message parser - Turns raw chat text into commands, mentions and emojis

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::domain::entities::{Emoji, Mentions};

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@!?([\w-]+)>").unwrap());
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@&([\w-]+)>").unwrap());
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"<#([\w-]+)>").unwrap());
static CUSTOM_EMOJI: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(a?):(\w+):([\w-]+)>").unwrap());

/// A chat message split into command name and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parses incoming text into commands
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a command message. Returns `None` for text that does not start
    /// with the prefix or has nothing after it.
    pub fn parse_command(&self, text: &str) -> Option<ParsedCommand> {
        let cmd_text = text.trim_start().strip_prefix(self.command_prefix.as_str())?;

        // Split command and arguments
        let mut parts = cmd_text.split_whitespace();
        let name = parts.next()?.to_lowercase();
        let args = parts.map(|s| s.to_string()).collect();

        Some(ParsedCommand { name, args })
    }

    /// Whether `text` is the cancel command, ignoring case and trailing whitespace
    pub fn is_cancel(&self, text: &str, keyword: &str) -> bool {
        let expected = format!("{}{}", self.command_prefix, keyword).to_lowercase();
        text.trim_end().to_lowercase() == expected
    }
}

/// Collect user, role and channel mentions from message text
pub fn parse_mentions(text: &str) -> Mentions {
    let collect = |re: &Regex| {
        re.captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect::<Vec<_>>()
    };

    Mentions {
        users: collect(&USER_MENTION),
        roles: collect(&ROLE_MENTION),
        channels: collect(&CHANNEL_MENTION),
    }
}

/// First custom emoji reference (`<:name:id>`) in the text
pub fn find_custom_emoji(text: &str) -> Option<Emoji> {
    let caps = CUSTOM_EMOJI.captures(text)?;
    Some(Emoji::Custom {
        id: caps.get(3)?.as_str().to_string(),
        name: caps.get(2)?.as_str().to_string(),
        animated: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
    })
}

/// Split a list answer into lines, dropping mention decoration such as
/// `<#` / `<@&` / `>` and blanks inside each line
pub fn split_list(text: &str, decorations: &[&str]) -> Vec<String> {
    text.split('\n')
        .map(|line| {
            let mut line = line.to_string();
            for deco in decorations {
                line = line.replace(deco, "");
            }
            line.chars().filter(|c| !c.is_whitespace()).collect::<String>()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// First unicode emoji grapheme anywhere in the text, including modifier,
/// keycap, flag and zero-width-joiner sequences
pub fn find_unicode_emoji(text: &str) -> Option<String> {
    unicode_emojis(text).into_iter().next()
}

/// Last unicode emoji grapheme in the text
pub fn find_last_unicode_emoji(text: &str) -> Option<String> {
    unicode_emojis(text).pop()
}

/// Every unicode emoji grapheme in the text, in order
pub fn unicode_emojis(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut found = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // keycaps: 1️⃣ #️⃣
        if (c.is_ascii_digit() || c == '#' || c == '*') && i + 1 < chars.len() {
            let mut j = i + 1;
            if chars[j] == '\u{FE0F}' {
                j += 1;
            }
            if j < chars.len() && chars[j] == '\u{20E3}' {
                found.push(chars[i..=j].iter().collect());
                i = j + 1;
                continue;
            }
        }

        if is_regional_indicator(c) {
            if i + 1 < chars.len() && is_regional_indicator(chars[i + 1]) {
                found.push(chars[i..i + 2].iter().collect());
                i += 2;
                continue;
            }
        } else if is_pictographic(c) {
            let end = extend_sequence(&chars, i);
            found.push(chars[i..end].iter().collect());
            i = end;
            continue;
        }

        i += 1;
    }

    found
}

fn extend_sequence(chars: &[char], start: usize) -> usize {
    let mut end = start + 1;
    while end < chars.len() {
        let c = chars[end];
        if is_modifier(c) {
            end += 1;
        } else if c == '\u{200D}' && end + 1 < chars.len() && is_pictographic(chars[end + 1]) {
            end += 2;
        } else {
            break;
        }
    }
    end
}

fn is_modifier(c: char) -> bool {
    matches!(c as u32,
        0xFE0E | 0xFE0F          // variation selectors
        | 0x1F3FB..=0x1F3FF      // skin tones
        | 0x20E3                 // keycap
        | 0xE0020..=0xE007F      // tag sequences
    )
}

fn is_regional_indicator(c: char) -> bool {
    matches!(c as u32, 0x1F1E6..=0x1F1FF)
}

fn is_pictographic(c: char) -> bool {
    matches!(c as u32,
        0x00A9 | 0x00AE | 0x203C | 0x2049 | 0x2122 | 0x2139
        | 0x2194..=0x2199 | 0x21A9..=0x21AA
        | 0x231A..=0x231B | 0x2328 | 0x23CF | 0x23E9..=0x23F3 | 0x23F8..=0x23FA
        | 0x24C2 | 0x25AA..=0x25AB | 0x25B6 | 0x25C0 | 0x25FB..=0x25FE
        | 0x2600..=0x27BF
        | 0x2934..=0x2935 | 0x2B05..=0x2B07 | 0x2B1B..=0x2B1C | 0x2B50 | 0x2B55
        | 0x3030 | 0x303D | 0x3297 | 0x3299
        | 0x1F000..=0x1F1E5
        | 0x1F200..=0x1FAFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_args() {
        let parser = MessageParser::new("!");
        let cmd = parser.parse_command("!Plugin activate Greetings").unwrap();
        assert_eq!(cmd.name, "plugin");
        assert_eq!(cmd.args, vec!["activate", "Greetings"]);
    }

    #[test]
    fn test_parse_command_requires_prefix_and_name() {
        let parser = MessageParser::new("!");
        assert!(parser.parse_command("plugin list").is_none());
        assert!(parser.parse_command("!").is_none());
        assert!(parser.parse_command("!   ").is_none());
    }

    #[test]
    fn test_multi_char_prefix() {
        let parser = MessageParser::new("bot ");
        let cmd = parser.parse_command("bot help config").unwrap();
        assert_eq!(cmd.name, "help");
        assert_eq!(cmd.args, vec!["config"]);
    }

    #[test]
    fn test_is_cancel() {
        let parser = MessageParser::new("!");
        assert!(parser.is_cancel("!cancel", "cancel"));
        assert!(parser.is_cancel("!CANCEL  \n", "cancel"));
        assert!(!parser.is_cancel(" !cancel please", "cancel"));
        assert!(!parser.is_cancel("cancel", "cancel"));
    }

    #[test]
    fn test_parse_mentions() {
        let mentions = parse_mentions("hi <@42> and <@!7>, see <#100> for <@&9>");
        assert_eq!(mentions.users, vec!["42", "7"]);
        assert_eq!(mentions.channels, vec!["100"]);
        assert_eq!(mentions.roles, vec!["9"]);
    }

    #[test]
    fn test_find_custom_emoji() {
        let emoji = find_custom_emoji("use <a:dance:555> please").unwrap();
        assert_eq!(emoji.key(), "555");
        assert!(matches!(emoji, Emoji::Custom { animated: true, .. }));
        assert!(find_custom_emoji("no emoji here").is_none());
    }

    #[test]
    fn test_find_unicode_emoji() {
        assert_eq!(find_unicode_emoji("take 👍 this"), Some("👍".to_string()));
        assert_eq!(find_unicode_emoji("👍🏽"), Some("👍🏽".to_string()));
        assert_eq!(find_unicode_emoji("flag 🇩🇪!"), Some("🇩🇪".to_string()));
        assert_eq!(find_unicode_emoji("1️⃣"), Some("1️⃣".to_string()));
        assert_eq!(
            find_unicode_emoji("👨\u{200D}👩\u{200D}👧"),
            Some("👨\u{200D}👩\u{200D}👧".to_string())
        );
        assert_eq!(find_unicode_emoji("❤️"), Some("❤️".to_string()));
        assert_eq!(find_unicode_emoji("plain text 123"), None);
    }

    #[test]
    fn test_last_unicode_emoji() {
        assert_eq!(
            unicode_emojis("🇩🇪 then 👍🏽 and 1️⃣"),
            vec!["🇩🇪".to_string(), "👍🏽".to_string(), "1️⃣".to_string()]
        );
        assert_eq!(find_last_unicode_emoji("first 🎉 then ✅"), Some("✅".to_string()));
        assert_eq!(find_last_unicode_emoji("no emoji"), None);
    }

    #[test]
    fn test_split_list_strips_decoration() {
        let channels = split_list("<#1>\n <#2> \r\n\n3", &["<#", ">"]);
        assert_eq!(channels, vec!["1", "2", "3"]);

        let roles = split_list("<@&10>\n<@&11>", &["<@&", ">"]);
        assert_eq!(roles, vec!["10", "11"]);
    }
}
