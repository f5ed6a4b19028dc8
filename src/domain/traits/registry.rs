use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::plugin::PluginTable;

/// Durable copy of the plugin table
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Persist every descriptor. Readers never observe a partial document.
    async fn save(&self, table: &PluginTable) -> Result<(), StorageError>;

    /// Restore the table. A missing document yields an empty table and every
    /// restored descriptor comes back unloaded.
    async fn load(&self) -> Result<PluginTable, StorageError>;
}
