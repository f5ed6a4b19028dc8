use chrono::{DateTime, Utc};

use crate::domain::entities::Command;
use crate::plugins::Plugin;

/// Basic liveness and info commands
pub struct GeneralPlugin {
    bot_name: String,
    started: DateTime<Utc>,
}

impl GeneralPlugin {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            started: Utc::now(),
        }
    }
}

impl Plugin for GeneralPlugin {
    fn name(&self) -> &str {
        "general"
    }

    fn description(&self) -> &str {
        "General bot commands"
    }

    fn commands(&self) -> Vec<Command> {
        let name = self.bot_name.clone();
        let started = self.started;

        vec![
            Command::new("ping")
                .with_description("Check that the bot is responsive")
                .with_handler(|_| Ok("Pong!".to_string())),
            Command::new("info")
                .with_description("Show information about the bot")
                .with_aliases(&["about"])
                .with_handler(move |_| {
                    let uptime = Utc::now() - started;
                    Ok(format!(
                        "{} v{}\nUptime: {}h {}m",
                        name,
                        env!("CARGO_PKG_VERSION"),
                        uptime.num_hours(),
                        uptime.num_minutes() % 60
                    ))
                }),
        ]
    }
}
