//! Plugin system for darkrai-bot
//! 
//! Units are discovered from header files on disk, activated through a host
//! runtime, and tracked by the [`PluginManager`].

pub mod builtin;
pub mod manager;
pub mod trait_def;

#[cfg(test)]
mod tests;

pub use manager::PluginManager;
pub use trait_def::Plugin;
