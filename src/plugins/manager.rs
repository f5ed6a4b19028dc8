//! Plugin manager - handles plugin discovery and lifecycle

use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::errors::{PluginError, PluginResult, RuntimeError};
use crate::domain::entities::{PluginDescriptor, PluginStats, PluginTable};
use crate::domain::traits::{HostRuntime, RegistryStore};
use crate::infrastructure::config::PluginConfig;
use crate::infrastructure::plugins::MetadataExtractor;

/// Single authority over the known plugins and their runtime status.
///
/// Every public operation holds the table lock until it completes, including
/// while it waits on the host runtime or the registry store, so operations on
/// one manager never interleave.
pub struct PluginManager {
    table: Mutex<PluginTable>,
    directories: Vec<PathBuf>,
    extension: String,
    private_prefix: String,
    activation_timeout: Option<Duration>,
    extractor: MetadataExtractor,
    runtime: Arc<dyn HostRuntime>,
    store: Arc<dyn RegistryStore>,
}

impl PluginManager {
    pub fn new(
        directories: Vec<PathBuf>,
        runtime: Arc<dyn HostRuntime>,
        store: Arc<dyn RegistryStore>,
    ) -> Self {
        Self {
            table: Mutex::new(PluginTable::new()),
            directories,
            extension: "plugin".to_string(),
            private_prefix: "_".to_string(),
            activation_timeout: None,
            extractor: MetadataExtractor::new(),
            runtime,
            store,
        }
    }

    pub fn from_config(
        config: &PluginConfig,
        runtime: Arc<dyn HostRuntime>,
        store: Arc<dyn RegistryStore>,
    ) -> Self {
        let manager = Self::new(config.directories.clone(), runtime, store)
            .with_extension(&config.extension)
            .with_private_prefix(&config.private_prefix);
        match config.activation_timeout() {
            Some(limit) => manager.with_activation_timeout(limit),
            None => manager,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    pub fn with_private_prefix(mut self, prefix: &str) -> Self {
        self.private_prefix = prefix.to_string();
        self
    }

    pub fn with_activation_timeout(mut self, limit: Duration) -> Self {
        self.activation_timeout = Some(limit);
        self
    }

    /// Restore the persisted registry, then either load everything or just rescan
    pub async fn start(&self, auto_load: bool) -> BTreeMap<String, bool> {
        self.restore().await;
        if auto_load {
            self.load_all().await
        } else {
            self.rescan().await;
            BTreeMap::new()
        }
    }

    /// Merge the persisted registry into the table. Failures are logged.
    pub async fn restore(&self) {
        let restored = match self.store.load().await {
            Ok(restored) => restored,
            Err(e) => {
                error!("Failed to load plugin registry: {}", PluginError::Persistence(e));
                return;
            }
        };

        let mut table = self.table.lock().await;
        for (name, descriptor) in restored {
            table.entry(name).or_insert(descriptor);
        }
    }

    /// Scan the plugin directories and refresh descriptors for every eligible file
    pub async fn discover(&self) -> Vec<PluginDescriptor> {
        let mut table = self.table.lock().await;
        self.discover_locked(&mut table).await
    }

    /// Rediscover and persist the result
    pub async fn rescan(&self) -> Vec<PluginDescriptor> {
        let mut table = self.table.lock().await;
        let touched = self.discover_locked(&mut table).await;
        self.persist(&table).await;
        touched
    }

    pub async fn load(&self, name: &str) -> PluginResult<()> {
        let mut table = self.table.lock().await;
        self.load_locked(&mut table, name).await
    }

    pub async fn unload(&self, name: &str) -> PluginResult<()> {
        let mut table = self.table.lock().await;
        let descriptor = table
            .get_mut(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        if !descriptor.loaded {
            return Err(PluginError::NotLoaded(name.to_string()));
        }

        let module_path = descriptor.module_path.clone();
        let result = self.call(&module_path, self.runtime.deactivate(&module_path)).await;

        let outcome = match result {
            Ok(()) => {
                descriptor.mark_unloaded();
                info!("Successfully unloaded plugin: {}", name);
                Ok(())
            }
            Err(e) => {
                // The runtime still reports the unit as it was; only the error changes
                descriptor.error = Some(e.to_string());
                error!("Failed to unload plugin {}: {}", name, e);
                Err(activation_error(name, e))
            }
        };

        self.persist(&table).await;
        outcome
    }

    pub async fn reload(&self, name: &str) -> PluginResult<()> {
        let mut table = self.table.lock().await;
        self.reload_locked(&mut table, name).await
    }

    /// Discover, then attempt to load every known plugin in name order
    pub async fn load_all(&self) -> BTreeMap<String, bool> {
        let mut table = self.table.lock().await;
        self.discover_locked(&mut table).await;

        let names: Vec<String> = table.keys().cloned().collect();
        let mut results = BTreeMap::new();
        for name in names {
            let ok = match self.load_locked(&mut table, &name).await {
                Ok(()) => true,
                Err(PluginError::AlreadyLoaded(_)) => {
                    warn!("Plugin {} was already loaded", name);
                    false
                }
                Err(_) => false,
            };
            results.insert(name, ok);
        }

        let loaded = results.values().filter(|ok| **ok).count();
        info!("Loaded {}/{} plugins", loaded, results.len());
        results
    }

    /// Reload every currently loaded plugin; others are left out of the result
    pub async fn reload_all(&self) -> BTreeMap<String, bool> {
        let mut table = self.table.lock().await;
        let names: Vec<String> = table
            .values()
            .filter(|d| d.loaded)
            .map(|d| d.name.clone())
            .collect();

        let mut results = BTreeMap::new();
        for name in names {
            let ok = self.reload_locked(&mut table, &name).await.is_ok();
            results.insert(name, ok);
        }
        results
    }

    /// Declared dependencies of `name` that are unknown or not loaded.
    ///
    /// Only direct dependencies are checked. `load` does not call this.
    pub async fn check_dependencies(&self, name: &str) -> Vec<String> {
        let table = self.table.lock().await;
        let Some(descriptor) = table.get(name) else {
            return Vec::new();
        };

        descriptor
            .metadata
            .dependencies
            .iter()
            .filter(|dep| !table.get(dep.as_str()).is_some_and(|d| d.loaded))
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> PluginStats {
        let table = self.table.lock().await;
        PluginStats::from_descriptors(table.values())
    }

    pub async fn get(&self, name: &str) -> Option<PluginDescriptor> {
        self.table.lock().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.table.lock().await.contains_key(name)
    }

    /// Configured plugin directories in scan order
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Every known descriptor in name order
    pub async fn list(&self) -> Vec<PluginDescriptor> {
        self.table.lock().await.values().cloned().collect()
    }

    async fn discover_locked(&self, table: &mut PluginTable) -> Vec<PluginDescriptor> {
        let mut touched: Vec<String> = Vec::new();

        for dir in &self.directories {
            let files = match self.eligible_files(dir).await {
                Ok(files) => files,
                Err(e) => {
                    warn!("Failed to scan plugin directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            info!("Scanning for plugins in: {}", dir.display());

            for file in files {
                let Some(name) = file.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                    continue;
                };
                let Some(module_path) = module_path_for(dir, &file) else {
                    warn!("Skipping {}: path is not valid UTF-8", file.display());
                    continue;
                };
                let metadata = self.extractor.extract_file(&file).await;

                table
                    .entry(name.clone())
                    .and_modify(|d| d.refresh(module_path.clone(), metadata.clone()))
                    .or_insert_with(|| PluginDescriptor::new(&name, module_path).with_metadata(metadata));

                if !touched.contains(&name) {
                    touched.push(name);
                }
            }
        }

        info!("Discovered {} plugins", touched.len());
        touched
            .iter()
            .filter_map(|name| table.get(name).cloned())
            .collect()
    }

    /// Files in `dir` with the plugin extension and no private prefix, sorted by name
    async fn eligible_files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with(self.private_prefix.as_str()));
            if !self.private_prefix.is_empty() && hidden {
                continue;
            }
            files.push(path);
        }

        files.sort();
        Ok(files)
    }

    async fn load_locked(&self, table: &mut PluginTable, name: &str) -> PluginResult<()> {
        let descriptor = table.get_mut(name).ok_or_else(|| {
            error!("Plugin {} not found in registry", name);
            PluginError::NotFound(name.to_string())
        })?;
        if descriptor.loaded {
            return Err(PluginError::AlreadyLoaded(name.to_string()));
        }

        let module_path = descriptor.module_path.clone();
        let result = self.call(&module_path, self.runtime.activate(&module_path)).await;
        let outcome = self.settle(descriptor, result, "loaded");

        self.persist(table).await;
        outcome
    }

    async fn reload_locked(&self, table: &mut PluginTable, name: &str) -> PluginResult<()> {
        let descriptor = table
            .get_mut(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let module_path = descriptor.module_path.clone();
        let result = self.call(&module_path, self.runtime.reload(&module_path)).await;
        let outcome = self.settle(descriptor, result, "reloaded");

        self.persist(table).await;
        outcome
    }

    /// Apply an activation outcome to a descriptor
    fn settle(
        &self,
        descriptor: &mut PluginDescriptor,
        result: Result<(), RuntimeError>,
        verb: &str,
    ) -> PluginResult<()> {
        match result {
            Ok(()) => {
                descriptor.mark_loaded(Utc::now());
                info!("Successfully {} plugin: {}", verb, descriptor.name);
                Ok(())
            }
            Err(e) => {
                descriptor.mark_failed(e.to_string());
                error!("Plugin {} could not be {}: {}", descriptor.name, verb, e);
                Err(activation_error(&descriptor.name, e))
            }
        }
    }

    async fn call<F>(&self, module_path: &str, fut: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = Result<(), RuntimeError>>,
    {
        match self.activation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(RuntimeError::Timeout {
                    module: module_path.to_string(),
                    limit,
                })
            }),
            None => fut.await,
        }
    }

    async fn persist(&self, table: &PluginTable) {
        if let Err(e) = self.store.save(table).await {
            error!("Failed to save plugin registry: {}", PluginError::Persistence(e));
        }
    }
}

fn activation_error(name: &str, e: RuntimeError) -> PluginError {
    PluginError::Activation {
        name: name.to_string(),
        message: e.to_string(),
    }
}

/// `bot/cogs/general.plugin` scanned from `bot/cogs` becomes `cogs.general`
fn module_path_for(dir: &Path, file: &Path) -> Option<String> {
    let base = dir.parent().unwrap_or(dir);
    let relative = file.strip_prefix(base).unwrap_or(file).with_extension("");

    let parts = relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("."))
}
