//! WebForms CLI configuration
//!
//! Settings are layered in this order, later layers winning:
//! - built-in defaults
//! - `webforms.toml` (or the file given with `--config`)
//! - `WEBFORMS_*` environment variables
//! - command line flags

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use webforms_core::viewstate::CompressionKind;
use webforms_core::ViewStateConfig;

use crate::error::{CliError, Result};

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "webforms.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "WEBFORMS_";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// View state protocol settings
    pub view_state: ViewStateConfig,

    /// Logging settings
    pub log: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve file and environment layers
    ///
    /// Without an explicit `path`, `webforms.toml` is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Apply `WEBFORMS_*` variables from `vars`
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "ENABLED" => self.view_state.enabled = parse_bool(&name, &value)?,
                "MAX_BYTES" => {
                    self.view_state.max_bytes = value
                        .parse()
                        .map_err(|_| invalid_variable(&name, &value))?
                }
                "COMPRESSION" => self.view_state.compression = parse_compression(&name, &value)?,
                "ZSTD_LEVEL" => {
                    self.view_state.zstd_level = value
                        .parse()
                        .map_err(|_| invalid_variable(&name, &value))?
                }
                "HASH_KEY" => {
                    self.view_state.hash_key = Some(value).filter(|key| !key.is_empty())
                }
                "LOG" => self.log.level = value,
                _ => {
                    debug!(variable = %name, "ignoring unknown environment override");
                    continue;
                }
            }
            debug!(variable = %name, "applied environment override");
        }
        Ok(())
    }

    /// Check the resulting view state settings
    pub fn validate(&self) -> Result<()> {
        self.view_state
            .validate()
            .map_err(|error| CliError::Config(error.to_string()))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_variable(name, value)),
    }
}

/// Comma separated codec names; `none` disables compression
fn parse_compression(name: &str, value: &str) -> Result<Vec<CompressionKind>> {
    let mut kinds = Vec::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.to_ascii_lowercase().as_str() {
            "none" | "raw" => {}
            "deflate" => kinds.push(CompressionKind::Deflate),
            "zstd" => kinds.push(CompressionKind::Zstd),
            _ => return Err(invalid_variable(name, value)),
        }
    }
    Ok(kinds)
}

fn invalid_variable(name: &str, value: &str) -> CliError {
    CliError::Config(format!("invalid value {:?} for {}", value, name))
}
