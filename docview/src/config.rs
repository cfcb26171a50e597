//! Viewer configuration from docview.toml

use crate::observer::DEFAULT_THRESHOLD;
use crate::outline::IdPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name of the optional configuration file in a content directory
pub const CONFIG_FILE: &str = "docview.toml";

/// Viewer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Path of the article manifest, relative to the content root
    pub manifest: String,

    /// Document shown when there is no usable manifest
    pub fallback_document: String,

    /// Visible fraction at which a heading becomes the active TOC entry
    pub observer_threshold: f64,

    /// Handling of derived heading ids that collide with existing ones
    pub id_policy: IdPolicy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            manifest: "articles/articles.json".to_string(),
            fallback_document: "content.html".to_string(),
            observer_threshold: DEFAULT_THRESHOLD,
            id_policy: IdPolicy::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a docview.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the docview.toml configuration file
    ///
    /// # Returns
    /// * `Ok(ViewerConfig)` - Successfully loaded configuration
    /// * `Err(ConfigError)` - Error reading, parsing or validating the file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;

        let config: ViewerConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;

        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load `docview.toml` from a content directory, or the defaults if it has none
    pub fn load_or_default<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a docview.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        fs::write(&path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.observer_threshold > 0.0 && self.observer_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.observer_threshold));
        }
        Ok(())
    }
}

/// Errors that can occur when loading or saving viewer configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),

    /// Observer threshold outside (0, 1]
    InvalidThreshold(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
            ConfigError::InvalidThreshold(t) => {
                write!(f, "observer_threshold must be in (0, 1], got {}", t)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
