use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::features::EngineConfig;
use crate::logging::LogConfig;
use crate::partition::PartitionConfig;
use crate::scoring::ScoringConfig;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Windowing and normalization engine settings
    pub engine: EngineConfig,

    /// Rule-based scorer settings
    pub scoring: ScoringConfig,

    /// Temporal partition settings
    pub partition: PartitionConfig,

    /// Logging settings
    pub logging: LogConfig,
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".riskradar")
            .join("config.toml")
    }

    /// Load from `path`, or the default location, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::load_from_file(&default_path)
                } else {
                    tracing::debug!(
                        path = %default_path.display(),
                        "Config file not found, using defaults"
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check every section for out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .context("Invalid [engine] configuration")?;

        let fraction = self.partition.train_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            anyhow::bail!("Invalid [partition] train_fraction: {}", fraction);
        }
        if !(self.scoring.epsilon > 0.0) {
            anyhow::bail!("Invalid [scoring] epsilon: {}", self.scoring.epsilon);
        }
        Ok(())
    }
}
