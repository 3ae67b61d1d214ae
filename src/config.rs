#![forbid(unsafe_code)]

//! Client configuration loaded from TOML with environment overrides.
//!
//! ```toml
//! [engine]
//! path = "/opt/slotbook/query-engine"
//! args = ["--json"]
//!
//! [coalescer]
//! window_ms = 0
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::coalescer::CoalesceWindow;
use crate::engine::ProcessTransportOptions;

/// Overrides the engine binary path.
pub const ENV_ENGINE: &str = "SLOTBOOK_ENGINE";
/// Overrides the coalescing window in milliseconds.
pub const ENV_WINDOW_MS: &str = "SLOTBOOK_WINDOW_MS";
/// Overrides the log filter.
pub const ENV_LOG: &str = "SLOTBOOK_LOG";

/// Resolved client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Engine process settings.
    #[serde(default)]
    pub engine: EngineSection,
    /// Coalescer settings.
    #[serde(default)]
    pub coalescer: CoalescerSection,
    /// Logging settings.
    #[serde(default)]
    pub log: LogSection,
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// `[engine]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    /// Engine executable.
    pub path: Option<PathBuf>,
    /// Arguments passed to the engine.
    #[serde(default)]
    pub args: Vec<String>,
}

/// `[coalescer]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoalescerSection {
    /// Window length in milliseconds; `0` closes the window at the next tick.
    #[serde(default)]
    pub window_ms: u64,
}

/// `[log]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    /// `tracing-subscriber` filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl ClientConfig {
    /// Loads `explicit`, or the default config file when present, then
    /// applies environment overrides.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::read(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => ClientConfig::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Reads and parses one TOML file without environment overrides.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ClientConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_ENGINE).filter(|v| !v.is_empty()) {
            self.engine.path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_WINDOW_MS) {
            self.coalescer.window_ms =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        key: ENV_WINDOW_MS,
                        value: raw.clone(),
                    })?;
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log.level = level;
        }
        Ok(())
    }

    /// File the configuration was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Coalescing window described by this configuration.
    pub fn window(&self) -> CoalesceWindow {
        CoalesceWindow::from_millis(self.coalescer.window_ms)
    }

    /// Process transport options, if an engine path is configured.
    pub fn transport_options(&self) -> Result<ProcessTransportOptions, ConfigError> {
        let path = self.engine.path.clone().ok_or(ConfigError::MissingEngine)?;
        let mut options = ProcessTransportOptions::new(path);
        options.args = self.engine.args.clone();
        Ok(options)
    }

    /// Renders the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    #[allow(missing_docs)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    #[allow(missing_docs)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {source}")]
    #[allow(missing_docs)]
    Serialize { source: toml::ser::Error },
    #[error("environment variable {key} has invalid value '{value}'")]
    #[allow(missing_docs)]
    InvalidEnv { key: &'static str, value: String },
    /// No engine path in the config file, environment, or command line.
    #[error("no query engine configured; set [engine].path, SLOTBOOK_ENGINE, or pass --engine")]
    MissingEngine,
}

/// Default location of the client config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("slotbook").join("client.toml"))
}
