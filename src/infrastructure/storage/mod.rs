//! File-based plugin registry storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::application::errors::StorageError;
use crate::domain::entities::PluginTable;
use crate::domain::traits::RegistryStore;

/// On-disk shape of the registry document
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    plugins: PluginTable,
}

/// JSON file registry store
pub struct JsonRegistryStore {
    path: PathBuf,
}

impl JsonRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RegistryStore for JsonRegistryStore {
    async fn save(&self, table: &PluginTable) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = RegistryDocument {
            last_updated: Some(Utc::now()),
            plugins: table.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        // Write aside then rename so readers only ever see a whole document
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved plugin registry with {} plugins to {}", table.len(), self.path.display());
        Ok(())
    }

    async fn load(&self) -> Result<PluginTable, StorageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No existing plugin registry found at {}", self.path.display());
                return Ok(PluginTable::new());
            }
            Err(e) => return Err(e.into()),
        };

        let document: RegistryDocument = serde_json::from_str(&content)?;

        let table: PluginTable = document
            .plugins
            .into_values()
            .map(|mut descriptor| {
                // A previous process's runtime state means nothing now
                descriptor.loaded = false;
                (descriptor.name.clone(), descriptor)
            })
            .collect();

        tracing::info!("Loaded plugin registry with {} plugins", table.len());
        Ok(table)
    }
}
