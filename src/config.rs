use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::infrastructure::logging::LogFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub registration: RegistrationConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Downgrade duplicate registrations to a warning and skip the entry.
    #[serde(default = "default_false")]
    pub soft_api_exceptions: bool,

    #[serde(default = "default_true")]
    pub warn_unresolved_dependencies: bool,

    /// Log the frozen priority order at debug level.
    #[serde(default = "default_false")]
    pub log_order: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Decimal places kept when printing numbers.
    #[serde(default = "default_accuracy")]
    pub number_accuracy: usize,

    #[serde(default = "default_none_text")]
    pub none_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Write rolling log files here instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            soft_api_exceptions: false,
            warn_unresolved_dependencies: true,
            log_order: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            number_accuracy: 2,
            none_text: default_none_text(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            filter: None,
            directory: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_accuracy() -> usize { 2 }
fn default_none_text() -> String { "<none>".to_string() }
fn default_level() -> String { "info".to_string() }

impl RegistryConfig {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
