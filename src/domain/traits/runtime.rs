use async_trait::async_trait;
use crate::application::errors::RuntimeError;

/// Capability that actually executes and stops a unit's code.
///
/// The plugin manager only ever talks to units through these three calls and
/// treats any error as opaque text.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    async fn activate(&self, module_path: &str) -> Result<(), RuntimeError>;

    async fn deactivate(&self, module_path: &str) -> Result<(), RuntimeError>;

    /// Deactivate then activate as one step
    async fn reload(&self, module_path: &str) -> Result<(), RuntimeError>;
}
