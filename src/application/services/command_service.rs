use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entities::{Command, CommandRegistry, Content, Message, PermissionLevel};
use crate::application::errors::CommandError;

/// Command service shared between the chat loop and the plugin runtime
pub type SharedCommandService = Arc<RwLock<CommandService>>;

/// Service for managing and executing commands
pub struct CommandService {
    registry: CommandRegistry,
    prefix: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            prefix: prefix.into(),
        }
    }

    pub fn shared(self) -> SharedCommandService {
        Arc::new(RwLock::new(self))
    }

    pub fn register(&mut self, command: Command) {
        self.registry.register(command);
    }

    pub fn unregister_owned_by(&mut self, module_path: &str) -> usize {
        self.registry.unregister_owned_by(module_path)
    }

    pub fn register_defaults(&mut self) {
        self.register(Command::new("version")
            .with_description("Show bot version")
            .with_handler(|_| Ok(format!("darkrai-bot v{}", env!("CARGO_PKG_VERSION")))));
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.registry.find(name).is_some()
    }

    pub fn handle(&self, message: &Message, level: PermissionLevel) -> Result<Option<String>, CommandError> {
        let Content::Command { name, .. } = &message.content else {
            return Ok(None);
        };

        if name == "help" {
            return Ok(Some(self.get_help(message.content.args().first().map(String::as_str))));
        }

        let cmd = self.registry.find(name)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        if !level.allows(cmd.level) {
            return Err(CommandError::PermissionDenied);
        }

        if let Some(handler) = &cmd.handler {
            Ok(Some(handler(message.clone())?))
        } else {
            Ok(Some(format!("Command {} not implemented", cmd.name)))
        }
    }

    pub fn get_help(&self, command: Option<&str>) -> String {
        if let Some(name) = command {
            if let Some(cmd) = self.registry.find(name) {
                let mut help = format!("{}{} - {}", self.prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
                if let Some(usage) = &cmd.usage {
                    help.push_str(&format!("\nUsage: {}", usage));
                }
                return help;
            }
            return format!("Command {}{} not found", self.prefix, name);
        }

        let mut names: Vec<&Command> = self.registry.all().collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));

        let mut help = "Available commands:\n".to_string();
        for cmd in names {
            help.push_str(&format!("  {}{} - {}\n", self.prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
        }
        help
    }
}
