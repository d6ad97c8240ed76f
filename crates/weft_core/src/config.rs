//! Runtime configuration (weft.toml)

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scheduler settings shared by every component of a [`Runtime`](crate::Runtime)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Render every default-state key in the first pass after mount
    #[serde(default = "default_true")]
    pub initial_render: bool,
    /// Consecutive re-entrant passes allowed before reporting a render loop
    #[serde(default = "default_max_trailing_passes")]
    pub max_trailing_passes: u32,
    /// State-effect rounds allowed per fold
    #[serde(default = "default_max_effect_rounds")]
    pub max_effect_rounds: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_trailing_passes() -> u32 {
    64
}

fn default_max_effect_rounds() -> u32 {
    16
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_render: true,
            max_trailing_passes: default_max_trailing_passes(),
            max_effect_rounds: default_max_effect_rounds(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    /// Load from a TOML file. The settings may sit at the top level or
    /// under a `[runtime]` table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;

        let config: RuntimeConfig = match table.get("runtime") {
            Some(runtime) => runtime.clone().try_into()?,
            None => toml::Value::Table(table).try_into()?,
        };
        Ok(config)
    }
}
