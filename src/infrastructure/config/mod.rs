//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::application::errors::ConfigError;
use crate::domain::entities::PermissionLevel;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub plugins: PluginConfig,
    pub permissions: PermissionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    /// Scanned in order; a later directory redefines names found earlier
    pub directories: Vec<PathBuf>,
    pub extension: String,
    pub private_prefix: String,
    pub registry_path: PathBuf,
    pub auto_load: bool,
    /// Plugins the admin surface refuses to unload
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub activation_timeout_secs: Option<u64>,
}

impl PluginConfig {
    pub fn activation_timeout(&self) -> Option<Duration> {
        self.activation_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PermissionConfig {
    pub owner_id: Option<String>,
    #[serde(default)]
    pub admin_users: Vec<String>,
}

impl PermissionConfig {
    /// Resolve the access level of a user id
    pub fn level_for(&self, user_id: Option<&str>) -> PermissionLevel {
        let Some(user_id) = user_id else {
            return PermissionLevel::User;
        };
        if self.owner_id.as_deref() == Some(user_id) {
            PermissionLevel::Owner
        } else if self.admin_users.iter().any(|u| u == user_id) {
            PermissionLevel::Admin
        } else {
            PermissionLevel::User
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "darkrai-bot".to_string(),
                prefix: "!".to_string(),
            },
            plugins: PluginConfig {
                directories: vec![PathBuf::from("bot/cogs"), PathBuf::from("bot/plugins")],
                extension: "plugin".to_string(),
                private_prefix: "_".to_string(),
                registry_path: PathBuf::from("data/plugin_registry.json"),
                auto_load: true,
                critical: vec![
                    "general".to_string(),
                    "settings".to_string(),
                    "plugin_management".to_string(),
                ],
                activation_timeout_secs: None,
            },
            permissions: PermissionConfig {
                owner_id: Some("console".to_string()),
                admin_users: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plugins.directories.is_empty() {
            return Err(ConfigError::InvalidValue("plugins.directories must not be empty".to_string()));
        }
        if self.plugins.extension.is_empty() || self.plugins.extension.starts_with('.') {
            return Err(ConfigError::InvalidValue(format!(
                "plugins.extension must be a bare extension, got '{}'",
                self.plugins.extension
            )));
        }
        Ok(())
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();

        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            config.bot.prefix = prefix;
        }

        if let Ok(owner) = std::env::var("OWNER_ID") {
            config.permissions.owner_id = Some(owner);
        }

        if let Ok(admins) = std::env::var("ADMIN_USERS") {
            config.permissions.admin_users = admins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(dir) = std::env::var("PLUGIN_DATA_DIR") {
            config.plugins.registry_path = PathBuf::from(dir).join("plugin_registry.json");
        }

        config
    }
}
