//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod registry;
pub mod runtime;

pub use bot::{Bot, BotInfo};
pub use registry::RegistryStore;
pub use runtime::HostRuntime;
