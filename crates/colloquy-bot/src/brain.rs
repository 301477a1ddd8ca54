//! Reply generation for the in-memory bot.

use colloquy_core::types::UserIdentity;

/// Produces the bot's side of the conversation.
pub trait BotBrain: Send + Sync {
    /// Posted once when a conversation opens.
    fn greeting(&self) -> Option<String> {
        None
    }

    /// Replies to one user message, oldest first. May be empty.
    fn reply(&self, from: &UserIdentity, text: &str) -> Vec<String>;
}

/// Brain that echoes the user back.
#[derive(Debug, Clone, Default)]
pub struct EchoBrain {
    greeting: Option<String>,
}

impl EchoBrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            greeting: Some(greeting.into()),
        }
    }
}

impl BotBrain for EchoBrain {
    fn greeting(&self) -> Option<String> {
        self.greeting.clone()
    }

    fn reply(&self, from: &UserIdentity, text: &str) -> Vec<String> {
        vec![format!("{}, you said: {}", from.user_name, text.trim())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_reply() {
        let brain = EchoBrain::new();
        let replies = brain.reply(&UserIdentity::default(), "  hi there ");
        assert_eq!(replies, vec!["My User, you said: hi there".to_string()]);
        assert_eq!(brain.greeting(), None);
    }

    #[test]
    fn test_greeting() {
        let brain = EchoBrain::with_greeting("Welcome!");
        assert_eq!(brain.greeting().as_deref(), Some("Welcome!"));
    }
}
