//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Plugin registry persistence
//! - Adapters: Platform integrations (console)
//! - Plugins: Header extraction and the builtin host runtime

pub mod config;
pub mod storage;
pub mod adapters;
pub mod plugins;
