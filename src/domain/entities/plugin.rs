use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PermissionLevel;

/// Descriptors keyed by plugin name, iterated in name order
pub type PluginTable = BTreeMap<String, PluginDescriptor>;

/// Declared header fields of a plugin unit.
///
/// Every field is optional; anything the header does not declare stays `None`
/// (or empty for `dependencies`) and is left out of the registry document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,
}

impl PluginMetadata {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coarse status derived from `loaded` and `error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Loaded,
    Available,
    Failed,
}

impl PluginStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PluginStatus::Loaded => "loaded",
            PluginStatus::Available => "available",
            PluginStatus::Failed => "failed",
        }
    }
}

/// Identity, metadata and runtime status of one loadable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    /// Module path handed to the host runtime
    #[serde(rename = "path")]
    pub module_path: String,
    #[serde(default)]
    pub metadata: PluginMetadata,
    #[serde(default)]
    pub loaded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_path: module_path.into(),
            metadata: PluginMetadata::default(),
            loaded: false,
            load_time: None,
            error: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PluginMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replace path and metadata from a fresh discovery pass, keeping runtime status
    pub fn refresh(&mut self, module_path: String, metadata: PluginMetadata) {
        self.module_path = module_path;
        self.metadata = metadata;
    }

    pub fn mark_loaded(&mut self, at: DateTime<Utc>) {
        self.loaded = true;
        self.load_time = Some(at);
        self.error = None;
    }

    pub fn mark_unloaded(&mut self) {
        self.loaded = false;
        self.error = None;
    }

    /// Record a failed activation. A unit that failed to come up is never loaded.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.loaded = false;
        self.error = Some(error.into());
    }

    pub fn status(&self) -> PluginStatus {
        if self.error.is_some() {
            PluginStatus::Failed
        } else if self.loaded {
            PluginStatus::Loaded
        } else {
            PluginStatus::Available
        }
    }

    /// Level a caller needs to use this unit's commands
    pub fn required_level(&self) -> PermissionLevel {
        self.metadata
            .required_permission
            .as_deref()
            .and_then(PermissionLevel::parse)
            .unwrap_or(PermissionLevel::User)
    }

    /// Name with the declared version appended, e.g. `example v1.0.0`
    pub fn label(&self) -> String {
        match &self.metadata.version {
            Some(version) => format!("{} v{}", self.name, version),
            None => self.name.clone(),
        }
    }
}

/// Aggregate counters over a plugin table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStats {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    pub success_rate: String,
}

impl PluginStats {
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a PluginDescriptor>) -> Self {
        let (mut total, mut loaded, mut failed) = (0, 0, 0);
        for descriptor in descriptors {
            total += 1;
            if descriptor.loaded {
                loaded += 1;
            }
            if descriptor.error.is_some() {
                failed += 1;
            }
        }

        let success_rate = if total == 0 {
            "0%".to_string()
        } else {
            format!("{:.1}%", loaded as f64 / total as f64 * 100.0)
        };

        Self { total, loaded, failed, success_rate }
    }
}
