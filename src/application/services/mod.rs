//! Application services - Business logic orchestration

pub mod command_service;
pub mod plugin_service;

pub use command_service::{CommandService, SharedCommandService};
pub use plugin_service::PluginAdminService;
