//! Builtin runtime - activates compiled-in plugins by module path

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::errors::RuntimeError;
use crate::application::services::command_service::SharedCommandService;
use crate::domain::traits::HostRuntime;
use crate::plugins::Plugin;

/// Host runtime for plugins linked into the binary.
///
/// Units are registered under the module path discovery derives for their
/// header file (e.g. `plugins.example`). Activating a unit wires its commands
/// into the shared command service.
pub struct BuiltinRuntime {
    units: HashMap<String, Arc<dyn Plugin>>,
    active: Mutex<HashSet<String>>,
    commands: SharedCommandService,
}

impl BuiltinRuntime {
    pub fn new(commands: SharedCommandService) -> Self {
        Self {
            units: HashMap::new(),
            active: Mutex::new(HashSet::new()),
            commands,
        }
    }

    /// Make a unit available under `module_path`
    pub fn with_unit<P: Plugin + 'static>(mut self, module_path: impl Into<String>, plugin: P) -> Self {
        self.units.insert(module_path.into(), Arc::new(plugin));
        self
    }

    #[cfg(test)]
    pub async fn is_active(&self, module_path: &str) -> bool {
        self.active.lock().await.contains(module_path)
    }

    fn unit(&self, module_path: &str) -> Result<&Arc<dyn Plugin>, RuntimeError> {
        self.units
            .get(module_path)
            .ok_or_else(|| RuntimeError::UnknownModule(module_path.to_string()))
    }

    async fn start(&self, module_path: &str, active: &mut HashSet<String>) -> Result<(), RuntimeError> {
        let plugin = self.unit(module_path)?;

        plugin.init().map_err(|message| RuntimeError::Failed {
            module: module_path.to_string(),
            message,
        })?;

        let mut commands = self.commands.write().await;
        for command in plugin.commands() {
            commands.register(command.with_owner(module_path));
        }
        active.insert(module_path.to_string());

        tracing::debug!("Activated {} ({})", plugin.name(), module_path);
        Ok(())
    }

    /// Shut the unit down, then remove its commands and mark it inactive.
    ///
    /// A failed shutdown leaves the unit active with its commands registered.
    async fn stop(&self, module_path: &str, active: &mut HashSet<String>) -> Result<(), RuntimeError> {
        let plugin = self.unit(module_path)?;
        plugin.shutdown().map_err(|message| RuntimeError::Failed {
            module: module_path.to_string(),
            message,
        })?;

        self.detach(module_path, active).await;
        Ok(())
    }

    async fn detach(&self, module_path: &str, active: &mut HashSet<String>) {
        let removed = self.commands.write().await.unregister_owned_by(module_path);
        active.remove(module_path);
        tracing::debug!("Deactivated {}, removed {} commands", module_path, removed);
    }
}

#[async_trait]
impl HostRuntime for BuiltinRuntime {
    async fn activate(&self, module_path: &str) -> Result<(), RuntimeError> {
        let mut active = self.active.lock().await;
        if active.contains(module_path) {
            return Err(RuntimeError::AlreadyActive(module_path.to_string()));
        }
        self.start(module_path, &mut active).await
    }

    async fn deactivate(&self, module_path: &str) -> Result<(), RuntimeError> {
        let mut active = self.active.lock().await;
        if !active.contains(module_path) {
            return Err(RuntimeError::NotActive(module_path.to_string()));
        }
        self.stop(module_path, &mut active).await
    }

    async fn reload(&self, module_path: &str) -> Result<(), RuntimeError> {
        let mut active = self.active.lock().await;
        if !active.contains(module_path) {
            return Err(RuntimeError::NotActive(module_path.to_string()));
        }
        if let Err(e) = self.stop(module_path, &mut active).await {
            // A reload that fails part way never leaves the old instance behind
            self.detach(module_path, &mut active).await;
            return Err(e);
        }
        self.start(module_path, &mut active).await
    }
}
