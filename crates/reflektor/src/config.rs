//! Engine configuration.
//!
//! [`EngineConfig`] can be built in code or read from YAML:
//!
//! ```yaml
//! entry_point:
//!   name: theme
//!   extension: less
//! base_dir: assets/styles
//! auto_apply_properties: false
//! ```
//!
//! Every field is optional; unknown fields are rejected.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::loader::Location;

/// The stylesheet [`StyleEngine::reload`](crate::StyleEngine::reload) loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryPoint {
    pub name: String,
    pub extension: String,
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self {
            name: "main".to_string(),
            extension: "less".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub entry_point: EntryPoint,
    /// Directory holding the entry point and its imports.
    pub base_dir: PathBuf,
    /// Named in-memory bundle to load from instead of `base_dir`.
    pub bundle: Option<String>,
    /// Whether proxies apply computed properties on every refresh.
    pub auto_apply_properties: bool,
    /// Whether the constraint plugin is registered.
    pub builtin_plugins: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_point: EntryPoint::default(),
            base_dir: PathBuf::from("."),
            bundle: None,
            auto_apply_properties: true,
            builtin_plugins: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| ConfigError {
            message: format!("failed to read {}: {}", path.display(), err),
        })?;
        Self::from_yaml(&source)
    }

    pub fn with_entry_point(mut self, name: impl Into<String>, extension: impl Into<String>) -> Self {
        self.entry_point = EntryPoint {
            name: name.into(),
            extension: extension.into(),
        };
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self.bundle = None;
        self
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    pub fn with_auto_apply_properties(mut self, enabled: bool) -> Self {
        self.auto_apply_properties = enabled;
        self
    }

    pub fn with_builtin_plugins(mut self, enabled: bool) -> Self {
        self.builtin_plugins = enabled;
        self
    }

    /// Where the entry point and its imports are looked up.
    pub fn location(&self) -> Location {
        match &self.bundle {
            Some(bundle) => Location::Bundle(bundle.clone()),
            None => Location::Dir(self.base_dir.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_point.name.trim().is_empty() {
            return Err(ConfigError {
                message: "entry_point.name must not be empty".to_string(),
            });
        }
        if self.entry_point.extension.trim().is_empty() || self.entry_point.extension.contains('.') {
            return Err(ConfigError {
                message: format!(
                    "entry_point.extension '{}' must be a bare extension such as 'less'",
                    self.entry_point.extension
                ),
            });
        }
        Ok(())
    }
}
