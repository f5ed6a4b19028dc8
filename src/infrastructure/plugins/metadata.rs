//! Plugin header extraction
//!
//! A unit declares itself with comment lines near the top of its file:
//!
//! ```text
//! # Plugin: Example
//! # Version: 1.0.0
//! # Dependencies: general, settings
//! # Permissions: user
//! ```

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;

use crate::domain::entities::PluginMetadata;

/// Only this many leading lines are searched for header fields
pub const HEADER_SCAN_LINES: usize = 50;

static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*([A-Za-z]+)\s*:(.*)$").expect("header pattern is valid"));

/// Reads declared metadata from a unit's source text without running it
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    max_lines: usize,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self { max_lines: HEADER_SCAN_LINES }
    }

    #[cfg(test)]
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Parse header fields out of source text. Unrecognised lines are skipped.
    pub fn extract(&self, source: &str) -> PluginMetadata {
        let mut metadata = PluginMetadata::default();

        for line in source.lines().take(self.max_lines) {
            let Some(caps) = HEADER_LINE.captures(line.trim()) else {
                continue;
            };
            let value = caps[2].trim();
            let text = || (!value.is_empty()).then(|| value.to_string());

            match &caps[1] {
                "Plugin" => metadata.display_name = text(),
                "Version" => metadata.version = text(),
                "Author" => metadata.author = text(),
                "Description" => metadata.description = text(),
                "Dependencies" => {
                    metadata.dependencies = value
                        .split(',')
                        .map(str::trim)
                        .filter(|dep| !dep.is_empty())
                        .map(String::from)
                        .collect();
                }
                "Permissions" => metadata.required_permission = text(),
                _ => {}
            }
        }

        metadata
    }

    /// Read and parse a file. An unreadable file is logged and yields empty metadata.
    pub async fn extract_file(&self, path: &Path) -> PluginMetadata {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => self.extract(&source),
            Err(e) => {
                tracing::warn!("Failed to load metadata for {}: {}", path.display(), e);
                PluginMetadata::default()
            }
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}
