use crate::application::errors::CommandError;
use crate::domain::entities::{Command, Content};
use crate::plugins::Plugin;

/// Template plugin showing the shape of a unit
pub struct ExamplePlugin;

impl Plugin for ExamplePlugin {
    fn name(&self) -> &str {
        "example"
    }

    fn description(&self) -> &str {
        "Example plugin showing basic functionality and structure"
    }

    fn commands(&self) -> Vec<Command> {
        vec![
            Command::new("example")
                .with_description("Example command")
                .with_handler(|_| Ok("This is an example plugin command!".to_string())),
            Command::new("demo")
                .with_description("Example command group")
                .with_usage("demo [info]")
                .with_handler(|msg| {
                    let Content::Command { args, .. } = &msg.content else {
                        return Ok(String::new());
                    };
                    match args.first().map(String::as_str) {
                        Some("info") => Ok("Example v1.0.0 by DarkraiBot Team".to_string()),
                        Some(other) => Err(CommandError::InvalidArgs(format!("unknown demo subcommand: {}", other))),
                        None => Ok("Subcommands: demo info".to_string()),
                    }
                }),
        ]
    }
}
