//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Optional TOML file passed by the caller
//! 3. Environment variables: `LABELTREE_*` prefix

use std::path::Path;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{TreeError, TreeResult};

pub const DEFAULT_PATH_SEPARATOR: &str = "/";

/// Tree settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Joins node names into keys of a flattened subtree
    pub path_separator: String,
    /// Number of nodes the arena pre-allocates
    pub initial_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
            initial_capacity: 0,
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub path_separator: Option<String>,
    pub initial_capacity: Option<usize>,
}

fn config_err(e: ConfigError) -> TreeError {
    TreeError::Config {
        message: e.to_string(),
    }
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> TreeResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| TreeError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| TreeError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            path_separator: overlay
                .path_separator
                .clone()
                .unwrap_or_else(|| self.path_separator.clone()),
            initial_capacity: overlay.initial_capacity.unwrap_or(self.initial_capacity),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `config_file` - Optional TOML file; a missing file is skipped
    ///
    /// # Errors
    /// Unreadable or malformed files, unparsable environment values, and an empty
    /// path separator are reported as [`TreeError::Config`].
    #[instrument(level = "debug")]
    pub fn load(config_file: Option<&Path>) -> TreeResult<Self> {
        let mut current = Self::default();

        if let Some(path) = config_file {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            } else {
                debug!("config file {} does not exist, skipping", path.display());
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        debug!(?current, "settings loaded");
        Ok(current)
    }

    /// Apply LABELTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> TreeResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("LABELTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("path_separator") {
            settings.path_separator = val;
        }
        match config.get::<usize>("initial_capacity") {
            Ok(val) => settings.initial_capacity = val,
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(config_err(e)),
        }

        Ok(settings)
    }

    /// Rejects settings no arena can work with, such as an empty path separator.
    pub fn validate(&self) -> TreeResult<()> {
        if self.path_separator.is_empty() {
            return Err(TreeError::Config {
                message: "path_separator must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
