//! Runtime configuration.
//!
//! Settings are stored as JSON. Missing fields fall back to their defaults,
//! so a config file only needs to mention what it changes.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;
use crate::ignore::KeyIgnoreList;
use crate::sync::{LabelPolicy, DEFAULT_UMBRELLA_LABEL};
use crate::traits::RecordId;

const CONFIG_DIR: &str = "hiersync";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Label every behaviour facet collapses into
    pub umbrella_label: String,
    /// Names classified as behaviours when a source reports plain names
    pub behavior_names: Vec<String>,
    /// Names classified as structural (contribute no label)
    pub structural_names: Vec<String>,
    /// Record ids whose subtrees are never cached
    pub ignore_keys: Vec<RecordId>,
    /// `tracing-subscriber` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let policy = LabelPolicy::default();
        let mut behavior_names: Vec<String> = policy.behavior_names.into_iter().collect();
        behavior_names.sort();
        let mut structural_names: Vec<String> = policy.structural_names.into_iter().collect();
        structural_names.sort();
        Self {
            umbrella_label: DEFAULT_UMBRELLA_LABEL.to_string(),
            behavior_names,
            structural_names,
            ignore_keys: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Loads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext != "json") {
            return Err(SyncError::UnsupportedConfig(path.to_path_buf()).into());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Loads `hiersync/config.json` from the platform config directory, or
    /// the defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("Failed to write config: {}", path.display()))
    }

    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy {
            umbrella_label: self.umbrella_label.clone(),
            behavior_names: self.behavior_names.iter().cloned().collect::<HashSet<_>>(),
            structural_names: self.structural_names.iter().cloned().collect::<HashSet<_>>(),
        }
    }

    pub fn ignore_list(&self) -> KeyIgnoreList<RecordId> {
        self.ignore_keys.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"umbrella_label": "Script"}"#).unwrap();
        assert_eq!(config.umbrella_label, "Script");
        assert_eq!(config.structural_names, vec!["Transform".to_string()]);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.behavior_names, vec!["Health", "PlayerController", "Spinner"]);
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let path = env::temp_dir().join("hiersync_config_test").join("config.json");
        let config = SyncConfig {
            behavior_names: vec!["Spinner".into()],
            ignore_keys: vec![3, 9],
            ..SyncConfig::default()
        };
        config.save(&path)?;

        let loaded = SyncConfig::load(&path)?;
        assert_eq!(loaded, config);
        assert!(loaded.label_policy().behavior_names.contains("Spinner"));
        assert_eq!(loaded.ignore_list().len(), 2);
        Ok(())
    }

    #[test]
    fn test_rejects_non_json_file() {
        let err = SyncConfig::load("settings.toml").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::UnsupportedConfig(_))
        ));
    }
}
