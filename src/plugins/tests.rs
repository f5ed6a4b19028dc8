//! Plugin manager scenarios against a scripted runtime

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use super::{Plugin, PluginManager};
use crate::application::errors::{PluginError, RuntimeError, StorageError};
use crate::application::services::CommandService;
use crate::domain::entities::{Command, PluginTable};
use crate::domain::traits::{HostRuntime, RegistryStore};
use crate::infrastructure::plugins::BuiltinRuntime;
use crate::infrastructure::storage::JsonRegistryStore;

/// Records every call and fails for modules marked as broken
#[derive(Default)]
struct FakeRuntime {
    broken: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeRuntime {
    fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }

    fn break_module(&self, module_path: &str) {
        self.broken.lock().unwrap().insert(module_path.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, op: &str, module_path: &str) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().push(format!("{} {}", op, module_path));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.broken.lock().unwrap().contains(module_path) {
            return Err(RuntimeError::Failed {
                module: module_path.to_string(),
                message: format!("{} exploded", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HostRuntime for FakeRuntime {
    async fn activate(&self, module_path: &str) -> Result<(), RuntimeError> {
        self.run("activate", module_path).await
    }

    async fn deactivate(&self, module_path: &str) -> Result<(), RuntimeError> {
        self.run("deactivate", module_path).await
    }

    async fn reload(&self, module_path: &str) -> Result<(), RuntimeError> {
        self.run("reload", module_path).await
    }
}

/// Keeps the last saved table in memory; can be told to fail writes
#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Option<PluginTable>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn save(&self, table: &PluginTable) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )));
        }
        *self.saved.lock().unwrap() = Some(table.clone());
        Ok(())
    }

    async fn load(&self) -> Result<PluginTable, StorageError> {
        Ok(self.saved.lock().unwrap().clone().unwrap_or_default())
    }
}

struct Fixture {
    tmp: TempDir,
    plugins_dir: PathBuf,
    runtime: Arc<FakeRuntime>,
    store: Arc<MemoryStore>,
    manager: PluginManager,
}

fn write(dir: &Path, file: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), content).unwrap();
}

fn fixture_with(runtime: FakeRuntime) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let plugins_dir = tmp.path().join("plugins");
    write(&plugins_dir, "alpha.plugin", "no header here\n");
    write(&plugins_dir, "beta.plugin", "# Version: 2.0\n# Dependencies: alpha\n");

    let runtime = Arc::new(runtime);
    let store = Arc::new(MemoryStore::default());
    let manager = PluginManager::new(vec![plugins_dir.clone()], runtime.clone(), store.clone());

    Fixture { tmp, plugins_dir, runtime, store, manager }
}

fn fixture() -> Fixture {
    fixture_with(FakeRuntime::default())
}

#[tokio::test]
async fn test_discover_alpha_beta_scenario() {
    let f = fixture();
    let found = f.manager.discover().await;

    let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(found[0].module_path, "plugins.alpha");
    assert!(found[0].metadata.is_empty());

    let beta = f.manager.get("beta").await.unwrap();
    assert_eq!(beta.metadata.version.as_deref(), Some("2.0"));
    assert_eq!(beta.metadata.dependencies, vec!["alpha"]);

    assert_eq!(f.manager.check_dependencies("beta").await, vec!["alpha"]);
    f.manager.load("alpha").await.unwrap();
    assert!(f.manager.check_dependencies("beta").await.is_empty());
}

#[tokio::test]
async fn test_rediscovery_preserves_runtime_status() {
    let f = fixture();
    f.manager.discover().await;
    f.runtime.break_module("plugins.beta");
    f.manager.load("alpha").await.unwrap();
    assert!(f.manager.load("beta").await.is_err());

    let before = f.manager.list().await;
    f.manager.discover().await;
    let after = f.manager.list().await;
    assert_eq!(before, after);

    let alpha = &after[0];
    assert!(alpha.loaded);
    assert!(alpha.load_time.is_some());
    assert!(after[1].error.as_deref().unwrap().contains("activate exploded"));
}

#[tokio::test]
async fn test_rediscovery_refreshes_metadata() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("beta").await.unwrap();

    write(&f.plugins_dir, "beta.plugin", "# Version: 3.0\n");
    f.manager.discover().await;

    let beta = f.manager.get("beta").await.unwrap();
    assert_eq!(beta.metadata.version.as_deref(), Some("3.0"));
    assert!(beta.metadata.dependencies.is_empty());
    assert!(beta.loaded);
}

#[tokio::test]
async fn test_load_missing_does_not_touch_table() {
    let f = fixture();
    f.manager.discover().await;
    let before = f.manager.list().await;

    assert!(matches!(f.manager.load("missing").await, Err(PluginError::NotFound(_))));
    assert_eq!(f.manager.list().await, before);
    assert!(f.runtime.calls().is_empty());
    assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_load_is_rejected() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("alpha").await.unwrap();
    let first = f.manager.get("alpha").await.unwrap().load_time;

    assert!(matches!(f.manager.load("alpha").await, Err(PluginError::AlreadyLoaded(_))));
    assert_eq!(f.manager.get("alpha").await.unwrap().load_time, first);
    assert_eq!(f.runtime.calls(), vec!["activate plugins.alpha"]);
}

#[tokio::test]
async fn test_unload_never_loaded() {
    let f = fixture();
    f.manager.discover().await;
    let before = f.manager.get("alpha").await;

    assert!(matches!(f.manager.unload("alpha").await, Err(PluginError::NotLoaded(_))));
    assert_eq!(f.manager.get("alpha").await, before);
    assert!(f.runtime.calls().is_empty());
}

#[tokio::test]
async fn test_unload_failure_keeps_loaded() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("alpha").await.unwrap();
    f.runtime.break_module("plugins.alpha");

    let err = f.manager.unload("alpha").await.unwrap_err();
    assert!(matches!(err, PluginError::Activation { .. }));

    let alpha = f.manager.get("alpha").await.unwrap();
    assert!(alpha.loaded);
    assert!(alpha.error.as_deref().unwrap().contains("deactivate exploded"));
}

/// Builtin unit whose shutdown can be made to fail
struct Stubborn {
    refuse: Arc<AtomicBool>,
}

impl Plugin for Stubborn {
    fn name(&self) -> &str {
        "alpha"
    }

    fn description(&self) -> &str {
        "Refuses to stop on demand"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::new("alpha").with_handler(|_| Ok("alpha".to_string()))]
    }

    fn shutdown(&self) -> Result<(), String> {
        if self.refuse.load(Ordering::SeqCst) {
            Err("busy".to_string())
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_failed_shutdown_keeps_builtin_unit_and_descriptor_in_step() {
    let f = fixture();
    let commands = CommandService::new("!").shared();
    let refuse = Arc::new(AtomicBool::new(true));
    let runtime = Arc::new(
        BuiltinRuntime::new(commands.clone()).with_unit("plugins.alpha", Stubborn { refuse: refuse.clone() }),
    );
    let manager = PluginManager::new(vec![f.plugins_dir.clone()], runtime.clone(), f.store.clone());
    manager.discover().await;
    manager.load("alpha").await.unwrap();

    assert!(manager.unload("alpha").await.is_err());
    let alpha = manager.get("alpha").await.unwrap();
    assert!(alpha.loaded);
    assert!(alpha.error.as_deref().unwrap().contains("busy"));
    assert!(runtime.is_active("plugins.alpha").await);
    assert!(commands.read().await.contains("alpha"));

    // Still unloadable once the unit lets go
    assert!(matches!(manager.load("alpha").await, Err(PluginError::AlreadyLoaded(_))));
    refuse.store(false, Ordering::SeqCst);
    manager.unload("alpha").await.unwrap();
    assert!(!manager.get("alpha").await.unwrap().loaded);
    assert!(!runtime.is_active("plugins.alpha").await);
    assert!(!commands.read().await.contains("alpha"));
}

#[tokio::test]
async fn test_unload_success_clears_state() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("alpha").await.unwrap();
    f.manager.unload("alpha").await.unwrap();

    let alpha = f.manager.get("alpha").await.unwrap();
    assert!(!alpha.loaded);
    assert!(alpha.error.is_none());
    let saved = f.store.saved.lock().unwrap().clone().unwrap();
    assert!(!saved["alpha"].loaded);
}

#[tokio::test]
async fn test_failed_reload_is_never_loaded_with_error() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("alpha").await.unwrap();
    f.runtime.break_module("plugins.alpha");

    assert!(f.manager.reload("alpha").await.is_err());
    let alpha = f.manager.get("alpha").await.unwrap();
    assert!(!alpha.loaded);
    assert!(alpha.error.as_deref().unwrap().contains("reload exploded"));
    assert_eq!(f.runtime.calls(), vec!["activate plugins.alpha", "reload plugins.alpha"]);
}

#[tokio::test]
async fn test_reload_unknown() {
    let f = fixture();
    assert!(matches!(f.manager.reload("ghost").await, Err(PluginError::NotFound(_))));
}

#[tokio::test]
async fn test_load_all_continues_past_failures() {
    let f = fixture();
    write(&f.plugins_dir, "gamma.plugin", "");
    f.runtime.break_module("plugins.beta");

    let results = f.manager.load_all().await;
    let expected: Vec<(&str, bool)> = vec![("alpha", true), ("beta", false), ("gamma", true)];
    let got: Vec<(&str, bool)> = results.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(got, expected);

    assert_eq!(
        f.runtime.calls(),
        vec!["activate plugins.alpha", "activate plugins.beta", "activate plugins.gamma"]
    );

    let stats = f.manager.stats().await;
    assert_eq!((stats.total, stats.loaded, stats.failed), (3, 2, 1));
    assert_eq!(stats.success_rate, "66.7%");
}

#[tokio::test]
async fn test_reload_all_only_touches_loaded() {
    let f = fixture();
    f.manager.discover().await;
    f.manager.load("beta").await.unwrap();

    let results = f.manager.reload_all().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results.get("beta"), Some(&true));
    assert!(!results.contains_key("alpha"));
}

#[tokio::test]
async fn test_check_dependencies_unknown_or_missing() {
    let f = fixture();
    write(&f.plugins_dir, "delta.plugin", "# Dependencies: alpha, zeta\n");
    f.manager.discover().await;
    f.manager.load("alpha").await.unwrap();

    assert_eq!(f.manager.check_dependencies("delta").await, vec!["zeta"]);
    assert!(f.manager.check_dependencies("alpha").await.is_empty());
    assert!(f.manager.check_dependencies("nobody").await.is_empty());
}

#[tokio::test]
async fn test_load_does_not_enforce_dependencies() {
    let f = fixture();
    f.manager.discover().await;
    assert!(f.manager.load("beta").await.is_ok());
}

#[tokio::test]
async fn test_stats_on_empty_table() {
    let f = fixture();
    let stats = f.manager.stats().await;
    assert_eq!((stats.total, stats.loaded, stats.failed), (0, 0, 0));
    assert_eq!(stats.success_rate, "0%");
}

#[tokio::test]
async fn test_private_files_and_directory_precedence() {
    let f = fixture();
    let tmp = TempDir::new().unwrap();
    let extra = tmp.path().join("extras");
    write(&extra, "alpha.plugin", "# Version: 9.0\n");
    write(&extra, "_hidden.plugin", "# Version: 1.0\n");
    write(&extra, "notes.txt", "# Version: 1.0\n");

    let manager = PluginManager::new(
        vec![f.plugins_dir.clone(), extra, tmp.path().join("missing")],
        f.runtime.clone(),
        f.store.clone(),
    );
    let found = manager.discover().await;

    let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    let alpha = manager.get("alpha").await.unwrap();
    assert_eq!(alpha.module_path, "extras.alpha");
    assert_eq!(alpha.metadata.version.as_deref(), Some("9.0"));
    assert!(!manager.contains("_hidden").await);
    assert!(!manager.contains("notes").await);
}

#[tokio::test]
async fn test_registry_roundtrip_into_fresh_manager() {
    let f = fixture();
    let registry = f.tmp.path().join("data").join("plugin_registry.json");
    let store = Arc::new(JsonRegistryStore::new(&registry));
    f.runtime.break_module("plugins.beta");

    let manager = PluginManager::new(vec![f.plugins_dir.clone()], f.runtime.clone(), store.clone());
    manager.load_all().await;
    let original = manager.list().await;

    let fresh = PluginManager::new(Vec::new(), Arc::new(FakeRuntime::default()), store);
    fresh.restore().await;
    let restored = fresh.list().await;

    assert_eq!(restored.len(), original.len());
    for (a, b) in original.iter().zip(&restored) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.module_path, b.module_path);
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.error, b.error);
        assert!(!b.loaded);
    }
    assert!(original[0].loaded);
}

#[tokio::test]
async fn test_orphaned_registry_entries_are_kept() {
    let f = fixture();
    f.store.save(&{
        let mut table = PluginTable::new();
        let d = crate::domain::entities::PluginDescriptor::new("retired", "plugins.retired");
        table.insert(d.name.clone(), d);
        table
    }).await.unwrap();

    f.manager.restore().await;
    f.manager.rescan().await;

    let names: Vec<String> = f.manager.list().await.into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["alpha", "beta", "retired"]);
    assert!(f.store.saved.lock().unwrap().as_ref().unwrap().contains_key("retired"));
}

#[tokio::test]
async fn test_persistence_failure_does_not_block_state() {
    let f = fixture();
    f.store.fail_saves.store(true, Ordering::SeqCst);
    f.manager.discover().await;

    f.manager.load("alpha").await.unwrap();
    assert!(f.manager.get("alpha").await.unwrap().loaded);
    assert!(f.store.saved.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_failed_load_is_persisted() {
    let f = fixture();
    f.manager.discover().await;
    f.runtime.break_module("plugins.alpha");

    assert!(f.manager.load("alpha").await.is_err());
    let saved = f.store.saved.lock().unwrap().clone().unwrap();
    assert!(saved["alpha"].error.is_some());
    assert!(!saved["alpha"].loaded);
}

#[tokio::test]
async fn test_activation_timeout_is_an_activation_error() {
    let f = fixture_with(FakeRuntime::slow(Duration::from_secs(5)));
    let manager = PluginManager::new(vec![f.plugins_dir.clone()], f.runtime.clone(), f.store.clone())
        .with_activation_timeout(Duration::from_millis(20));
    manager.discover().await;

    let err = manager.load("alpha").await.unwrap_err();
    assert!(matches!(err, PluginError::Activation { .. }));
    let alpha = manager.get("alpha").await.unwrap();
    assert!(!alpha.loaded);
    assert_eq!(alpha.error.as_deref(), Some("Module 'plugins.alpha' timed out after 20ms"));
}

#[tokio::test]
async fn test_start_without_auto_load_only_rescans() {
    let f = fixture();
    let results = f.manager.start(false).await;
    assert!(results.is_empty());
    assert_eq!(f.manager.list().await.len(), 2);
    assert!(f.runtime.calls().is_empty());
    assert_eq!(f.store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bundled_plugin_directories() {
    let bot = Path::new(env!("CARGO_MANIFEST_DIR")).join("bot");
    let commands = CommandService::new("!").shared();
    let runtime = Arc::new(super::builtin::runtime(commands.clone(), "test-bot"));
    let manager = PluginManager::new(
        vec![bot.join("cogs"), bot.join("plugins")],
        runtime,
        Arc::new(MemoryStore::default()),
    );

    let found = manager.discover().await;
    let names: Vec<(&str, &str)> = found.iter().map(|d| (d.name.as_str(), d.module_path.as_str())).collect();
    assert_eq!(names, vec![("general", "cogs.general"), ("example", "plugins.example")]);
    assert!(!manager.contains("_template").await);

    let results = manager.load_all().await;
    assert!(results.values().all(|ok| *ok), "{:?}", results);
    assert!(commands.read().await.contains("ping"));
    assert!(commands.read().await.contains("demo"));
}
