use std::collections::HashMap;

use super::{Message, PermissionLevel};
use crate::application::errors::CommandError;

/// Command handler function type
pub type CommandHandler = Box<dyn Fn(Message) -> Result<String, CommandError> + Send + Sync>;

/// A chat command contributed by the host or by a plugin
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub handler: Option<CommandHandler>,
    pub level: PermissionLevel,
    /// Module path of the plugin that registered this command, if any
    pub owner: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            handler: None,
            level: PermissionLevel::User,
            owner: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    #[cfg(test)]
    pub fn with_level(mut self, level: PermissionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_owner(mut self, module_path: impl Into<String>) -> Self {
        self.owner = Some(module_path.into());
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Message) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        self.name.eq_ignore_ascii_case(input)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(input))
    }
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name.clone(), command);
    }

    /// Drop every command registered by the given module, returning how many went
    pub fn unregister_owned_by(&mut self, module_path: &str) -> usize {
        let before = self.commands.len();
        self.commands
            .retain(|_, c| c.owner.as_deref() != Some(module_path));
        before - self.commands.len()
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.commands.values().find(|c| c.matches(input))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }
}
