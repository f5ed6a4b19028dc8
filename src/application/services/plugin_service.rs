//! Administrative plugin commands

use std::sync::Arc;

use crate::application::errors::PluginError;
use crate::domain::entities::{PermissionLevel, PluginDescriptor, PluginStatus};
use crate::plugins::PluginManager;

/// Longest list shown per status group
const LIST_LIMIT: usize = 10;

/// Plugins shown under "Recent Errors" in `status`
const ERROR_LIMIT: usize = 5;

/// Characters kept from each error message in `status`
const ERROR_CHARS: usize = 100;

/// Text front end for plugin administration (`plugin <subcommand>`)
pub struct PluginAdminService {
    manager: Arc<PluginManager>,
    critical: Vec<String>,
    prefix: String,
}

impl PluginAdminService {
    pub fn new(manager: Arc<PluginManager>, critical: Vec<String>, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            critical,
            prefix: prefix.into(),
        }
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Names the admin surface answers to
    pub fn matches(name: &str) -> bool {
        matches!(name, "plugin" | "plugins" | "cog" | "cogs")
    }

    /// Run one subcommand and render the reply
    pub async fn handle(&self, args: &[String], level: PermissionLevel) -> String {
        if !level.allows(PermissionLevel::Admin) {
            return "❌ Permission denied: plugin management requires admin".to_string();
        }

        let sub = args.first().map(String::as_str);
        let target = args.get(1).map(String::as_str);

        match (sub, target) {
            (None, _) => self.overview().await,
            (Some("list"), _) => self.list().await,
            (Some("status"), _) => self.status().await,
            (Some("rescan"), _) => self.rescan().await,
            (Some("reload"), name) => self.reload(name).await,
            (Some("load"), Some(name)) => self.load(name).await,
            (Some("unload"), Some(name)) => self.unload(name).await,
            (Some("info"), Some(name)) => self.info(name).await,
            (Some("deps"), Some(name)) => self.deps(name).await,
            (Some(cmd @ ("load" | "unload" | "info" | "deps")), None) => {
                format!("Usage: {}plugin {} <name>", self.prefix, cmd)
            }
            (Some(other), _) => format!(
                "Unknown subcommand `{}`. Use `{}plugin` for help.",
                other, self.prefix
            ),
        }
    }

    async fn overview(&self) -> String {
        let stats = self.manager.stats().await;
        let p = &self.prefix;
        format!(
            "🔌 Plugin Management\n\
             {p}plugin list - List all plugins\n\
             {p}plugin load <name> - Load a plugin\n\
             {p}plugin unload <name> - Unload a plugin\n\
             {p}plugin reload [name] - Reload one or all plugins\n\
             {p}plugin info <name> - Plugin information\n\
             {p}plugin deps <name> - Check dependencies\n\
             {p}plugin status - System statistics\n\
             {p}plugin rescan - Rediscover plugins\n\n\
             Total: {} | Loaded: {} | Success Rate: {}",
            stats.total, stats.loaded, stats.success_rate
        )
    }

    async fn list(&self) -> String {
        let plugins = self.manager.list().await;
        if plugins.is_empty() {
            return format!("❌ No plugins found. Use `{}plugin rescan` to discover plugins.", self.prefix);
        }

        let mut out = String::from("📋 Available Plugins\n");
        for (status, title, mark) in [
            (PluginStatus::Loaded, "Loaded", "✅"),
            (PluginStatus::Available, "Available", "⏸️"),
            (PluginStatus::Failed, "Failed", "❌"),
        ] {
            let group: Vec<&PluginDescriptor> = plugins.iter().filter(|p| p.status() == status).collect();
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("\n{} ({})\n", title, group.len()));
            for plugin in group.iter().take(LIST_LIMIT) {
                out.push_str(&format!("{} {}\n", mark, plugin.label()));
            }
            if group.len() > LIST_LIMIT {
                out.push_str("...\n");
            }
        }
        out.push_str(&format!("\nTotal: {} plugins", plugins.len()));
        out
    }

    async fn load(&self, name: &str) -> String {
        let Some(plugin) = self.manager.get(name).await else {
            return format!(
                "❌ Plugin `{}` not found. Use `{}plugin list` to see available plugins.",
                name, self.prefix
            );
        };
        if plugin.loaded {
            return format!(
                "⚠️ Plugin `{}` is already loaded. Use `{}plugin reload` to reload it.",
                name, self.prefix
            );
        }

        let missing = self.manager.check_dependencies(name).await;
        if !missing.is_empty() {
            return format!("❌ Cannot load `{}`: Missing dependencies: {}", name, missing.join(", "));
        }

        match self.manager.load(name).await {
            Ok(()) => {
                let mut reply = format!("✅ Successfully loaded plugin `{}`", name);
                if let Some(description) = &plugin.metadata.description {
                    reply.push_str(&format!("\nDescription: {}", description));
                }
                if let Some(version) = &plugin.metadata.version {
                    reply.push_str(&format!("\nVersion: {}", version));
                }
                reply
            }
            Err(e) => format!("❌ Failed to load plugin `{}`: {}", name, failure_text(e)),
        }
    }

    async fn unload(&self, name: &str) -> String {
        let Some(plugin) = self.manager.get(name).await else {
            return format!("❌ Plugin `{}` not found.", name);
        };
        if !plugin.loaded {
            return format!("⚠️ Plugin `{}` is not currently loaded.", name);
        }
        if self.critical.iter().any(|c| c == name) {
            return format!("❌ Cannot unload critical plugin `{}`.", name);
        }

        match self.manager.unload(name).await {
            Ok(()) => format!("✅ Successfully unloaded plugin `{}`", name),
            Err(e) => format!("❌ Failed to unload plugin `{}`: {}", name, failure_text(e)),
        }
    }

    async fn reload(&self, name: Option<&str>) -> String {
        if let Some(name) = name {
            return match self.manager.reload(name).await {
                Ok(()) => format!("✅ Successfully reloaded plugin `{}`", name),
                Err(PluginError::NotFound(_)) => format!("❌ Plugin `{}` not found.", name),
                Err(e) => format!("❌ Failed to reload plugin `{}`: {}", name, failure_text(e)),
            };
        }

        let results = self.manager.reload_all().await;
        let ok = results.values().filter(|ok| **ok).count();
        let mut reply = format!("🔄 Reloaded {}/{} plugins successfully", ok, results.len());

        let failed: Vec<&str> = results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect();
        if !failed.is_empty() {
            let shown = failed.iter().take(LIST_LIMIT).copied().collect::<Vec<_>>().join(", ");
            let more = if failed.len() > LIST_LIMIT { "..." } else { "" };
            reply.push_str(&format!("\nFailed Plugins: {}{}", shown, more));
        }
        reply
    }

    async fn info(&self, name: &str) -> String {
        let Some(plugin) = self.manager.get(name).await else {
            return format!("❌ Plugin `{}` not found.", name);
        };

        let meta = &plugin.metadata;
        let mut out = format!("🔌 Plugin: {}\n", meta.display_name.as_deref().unwrap_or(&plugin.name));
        out.push_str(&format!("Status: {}\n", plugin.status().as_str()));
        out.push_str(&format!("Module: {}\n", plugin.module_path));
        if let Some(version) = &meta.version {
            out.push_str(&format!("Version: {}\n", version));
        }
        if let Some(author) = &meta.author {
            out.push_str(&format!("Author: {}\n", author));
        }
        if let Some(description) = &meta.description {
            out.push_str(&format!("Description: {}\n", description));
        }
        if !meta.dependencies.is_empty() {
            out.push_str(&format!("Dependencies: {}\n", meta.dependencies.join(", ")));
        }
        out.push_str(&format!("Required Permission: {}\n", plugin.required_level()));
        if let Some(at) = plugin.load_time {
            out.push_str(&format!("Loaded At: {}\n", at.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(error) = &plugin.error {
            out.push_str(&format!("Error: {}\n", error));
        }
        out.trim_end().to_string()
    }

    async fn deps(&self, name: &str) -> String {
        if !self.manager.contains(name).await {
            return format!("❌ Plugin `{}` not found.", name);
        }
        let missing = self.manager.check_dependencies(name).await;
        if missing.is_empty() {
            format!("✅ All dependencies of `{}` are loaded", name)
        } else {
            format!("⚠️ `{}` is missing: {}", name, missing.join(", "))
        }
    }

    async fn status(&self) -> String {
        let stats = self.manager.stats().await;
        let mut out = format!(
            "📊 Plugin System Status\nTotal: {}\nLoaded: {}\nFailed: {}\nSuccess Rate: {}\n",
            stats.total, stats.loaded, stats.failed, stats.success_rate
        );

        let mut directories = Vec::new();
        for dir in self.manager.directories() {
            if tokio::fs::try_exists(dir).await.unwrap_or(false) {
                directories.push(format!("`{}`", dir.display()));
            }
        }
        out.push_str("\nPlugin Directories\n");
        if directories.is_empty() {
            out.push_str("None\n");
        } else {
            for dir in directories {
                out.push_str(&format!("{}\n", dir));
            }
        }

        let plugins = self.manager.list().await;
        let errors: Vec<(&str, &str)> = plugins
            .iter()
            .filter_map(|p| p.error.as_deref().map(|e| (p.name.as_str(), e)))
            .take(ERROR_LIMIT)
            .collect();
        if !errors.is_empty() {
            out.push_str("\nRecent Errors\n");
            for (name, error) in errors {
                let short: String = error.chars().take(ERROR_CHARS).collect();
                out.push_str(&format!("{}: {}\n", name, short));
            }
        }

        out.trim_end().to_string()
    }

    async fn rescan(&self) -> String {
        let found = self.manager.rescan().await;
        let mut out = format!("🔍 Rescan complete: discovered {} plugins", found.len());

        let fresh: Vec<&str> = found.iter().filter(|p| !p.loaded).map(|p| p.name.as_str()).collect();
        if !fresh.is_empty() {
            let shown = fresh.iter().take(LIST_LIMIT).copied().collect::<Vec<_>>().join(", ");
            let more = if fresh.len() > LIST_LIMIT { "..." } else { "" };
            out.push_str(&format!("\nNew Plugins Found: {}{}", shown, more));
        }
        out
    }
}

/// Underlying cause without the plugin name prefix
fn failure_text(e: PluginError) -> String {
    match e {
        PluginError::Activation { message, .. } => message,
        other => other.to_string(),
    }
}
