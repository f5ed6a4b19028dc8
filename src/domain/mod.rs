//! Domain layer - Core business objects and abstractions
//! 
//! This layer contains:
//! - Entities: Core business objects (User, Message, Command, PluginDescriptor)
//! - Traits: Abstractions for infrastructure (Bot, HostRuntime, RegistryStore)

pub mod entities;
pub mod traits;
