use crate::debugger::property::Limits;
use crate::{muted_error, weak_error};
use log::error;
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;

/// Engine settings, loaded from TOML. Missing keys take default values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub app_id: String,
    pub language_name: String,
    pub language_version: String,
    pub max_data: usize,
    pub max_children: usize,
    pub max_depth: usize,
    /// Hard cap for a single outgoing packet, unlimited if absent.
    pub buffer_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            app_id: "dbgp-engine".to_string(),
            language_name: "playground".to_string(),
            language_version: env!("CARGO_PKG_VERSION").to_string(),
            max_data: limits.max_data,
            max_children: limits.max_children,
            max_depth: limits.max_depth,
            buffer_limit: None,
        }
    }
}

impl EngineConfig {
    const DEFAULT_PATH: &'static str = ".config/dbgp-engine/config.toml";

    pub fn limits(&self) -> Limits {
        Limits {
            max_data: self.max_data,
            max_children: self.max_children,
            max_depth: self.max_depth,
        }
    }

    /// Load config from file (the home directory preset location when `path`
    /// is absent). Return [`None`] on errors.
    pub fn from_file(path: Option<&Path>) -> Option<Self> {
        let data = match path {
            None => {
                let path = home::home_dir()?.join(Self::DEFAULT_PATH);
                muted_error!(read_to_string(path))?
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    error!("Error while load config file {}: {err}", path.display());
                    return None;
                }
            },
        };
        weak_error!(toml::de::from_str(&data), "invalid config:")
    }
}
