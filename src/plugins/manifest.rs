//! Plugins shipped with the bot

use std::sync::Arc;

use crate::plugins::greetings::GreetingsPlugin;
use crate::plugins::trait_def::Plugin;

/// Every plugin the bot loads at startup, in load order
pub fn manifest() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(GreetingsPlugin::new())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let plugins = manifest();
        let names: HashSet<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), plugins.len());
        assert!(!names.contains("permissions"));
        assert!(!names.contains("builtin-commands"));
    }
}
