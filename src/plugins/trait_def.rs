//! Plugin trait definitions

use crate::domain::entities::Command;

/// A compiled-in unit the builtin runtime can activate.
///
/// Activation calls `init` and then registers `commands`. Deactivation calls
/// `shutdown` and, once it succeeds, removes every command the unit contributed.
pub trait Plugin: Send + Sync {
    /// Unique identifier for the plugin
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Commands contributed while the plugin is active
    fn commands(&self) -> Vec<Command>;

    /// Optional: Prepare resources before commands are registered
    fn init(&self) -> Result<(), String> {
        Ok(())
    }

    /// Optional: Cleanup resources when plugin is unloaded
    fn shutdown(&self) -> Result<(), String> {
        Ok(())
    }
}
