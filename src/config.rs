use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::batch::BatchConfig;
use crate::logging::LogConfig;
use crate::scoring::config::{ConfigLoader, ConfigTemplates, ScoringSection};
use crate::scoring::{Algorithm, ScoringConfig, ScoringError};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging output settings
    pub logging: LogConfig,

    /// Batch scoring settings
    pub batch: BatchConfig,

    /// Scoring policy; absent until one is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringSection>,
}

/// Configuration management implementation
impl AppConfig {
    /// Default configuration with the built-in template for `algorithm`
    pub fn with_template(algorithm: Algorithm) -> Self {
        Self {
            scoring: Some(ScoringSection::from(&ConfigTemplates::for_algorithm(algorithm))),
            ..Default::default()
        }
    }

    /// Typed scoring configuration from the `[scoring]` section
    pub fn scoring_config(&self) -> std::result::Result<ScoringConfig, ScoringError> {
        ConfigLoader::build_config(self.scoring.as_ref())
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skillscore")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Could not load config file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&self) -> Result<PathBuf> {
        let config_path = Self::default_config_path();
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }
}
