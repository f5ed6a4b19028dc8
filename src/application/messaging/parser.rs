//! Message parser - Parses raw messages into structured messages

use crate::domain::entities::{Content, Message, User};

/// Parses incoming text into structured Message objects
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    /// Parse a text message
    pub fn parse(&self, chat_id: impl Into<String>, text: impl Into<String>, sender: Option<User>) -> Message {
        let text = text.into();
        let trimmed = text.trim();

        let content = match self.strip_prefix(trimmed) {
            Some(cmd_text) => Self::parse_command(cmd_text),
            None if trimmed.is_empty() => Content::Empty,
            None => Content::Text(trimmed.to_string()),
        };

        let message = Message::new(chat_id, content);
        match sender {
            Some(user) => message.with_sender(user),
            None => message,
        }
    }

    fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.strip_prefix(self.command_prefix.as_str())
            .or_else(|| text.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Split command name and arguments
    fn parse_command(cmd_text: &str) -> Content {
        let mut parts = cmd_text.split_whitespace().map(String::from);
        let name = parts.next().unwrap_or_default().to_lowercase();
        Content::Command { name, args: parts.collect() }
    }
}
