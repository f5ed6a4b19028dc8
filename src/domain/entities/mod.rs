//! Domain entities - Core business objects

pub mod user;
pub mod message;
pub mod command;
pub mod permission;
pub mod plugin;

pub use user::User;
pub use message::{Message, Content};
pub use command::{Command, CommandRegistry};
pub use permission::PermissionLevel;
pub use plugin::{PluginDescriptor, PluginMetadata, PluginStats, PluginStatus, PluginTable};
