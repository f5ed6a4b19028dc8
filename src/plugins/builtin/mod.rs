//! Plugins compiled into the bot binary

pub mod example;
pub mod general;

pub use example::ExamplePlugin;
pub use general::GeneralPlugin;

use crate::application::services::command_service::SharedCommandService;
use crate::infrastructure::plugins::BuiltinRuntime;

/// Runtime with every builtin unit registered under its module path
pub fn runtime(commands: SharedCommandService, bot_name: &str) -> BuiltinRuntime {
    BuiltinRuntime::new(commands)
        .with_unit("cogs.general", GeneralPlugin::new(bot_name))
        .with_unit("plugins.example", ExamplePlugin)
}
