//! Protocol configuration: per-module gates and reassembly limits.
//!
//! Loaded once at startup and again on reload; the [`Protocol`] service
//! applies it to the router's gates and the inbound reassembly table.
//! A module absent from the file is disabled — features are opt-in.
//!
//! ```toml
//! chunk_timeout_ms = 5000
//! max_fragments = 200
//!
//! [modules.COLL]
//! enabled = true
//!
//! [modules.GOMV]
//! enabled = true
//! min_security = 3
//! ```
//!
//! [`Protocol`]: crate::Protocol

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors surfaced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gating for one feature module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Whether the module's handlers may run at all.
    #[serde(default)]
    pub enabled: bool,

    /// Minimum security level a peer needs for this module's opcodes.
    /// `None` means no floor.
    #[serde(default)]
    pub min_security: Option<u32>,
}

/// Top-level protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long a partially-received transfer may sit idle before its
    /// state is evicted.
    #[serde(default = "default_chunk_timeout_ms")]
    pub chunk_timeout_ms: u64,

    /// Upper bound on fragments per logical message.
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,

    /// Module code → gate. Keys are the short uppercase module tokens
    /// used on the wire.
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,
}

fn default_chunk_timeout_ms() -> u64 {
    5000
}

fn default_max_fragments() -> usize {
    200
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chunk_timeout_ms: default_chunk_timeout_ms(),
            max_fragments: default_max_fragments(),
            modules: HashMap::new(),
        }
    }
}

impl ProtocolConfig {
    /// Parses a configuration document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    /// Module codes currently enabled, sorted for stable output.
    pub fn enabled_modules(&self) -> Vec<String> {
        let mut enabled: Vec<String> = self
            .modules
            .iter()
            .filter(|(_, module)| module.enabled)
            .map(|(code, _)| code.clone())
            .collect();
        enabled.sort();
        enabled
    }
}
