//! Tool configuration for `vitae.toml` and the persisted preview state.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError
//! ├── state      # vitae.json (visible/last/external documents)
//! └── mod.rs     # PreviewConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section        | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `[serve]`      | HTTP port, event stream port, watching           |
//! | `[render]`     | Headless browser command and timeout             |
//! | `[extract]`    | Text extraction command and timeout              |
//! | `[lifecycle]`  | Debounce window, keepalive, idle grace period    |
//!
//! # Example
//!
//! ```toml
//! [serve]
//! port = 5277
//! events_port = 35730
//!
//! [render]
//! browser = "chromium"
//! timeout_secs = 60
//!
//! [lifecycle]
//! idle_grace_ms = 5000
//! ```

mod error;
pub mod state;

pub use error::ConfigError;
pub use state::{State, StateStore};

use crate::cli::{Cli, ServeArgs};
use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing vitae.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Workspace root (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Preview server settings
    pub serve: ServeConfig,

    /// PDF rendering settings
    pub render: RenderConfig,

    /// Text extraction settings
    pub extract: ExtractConfig,

    /// Timing of watcher, event stream and idle shutdown
    pub lifecycle: LifecycleConfig,
}

/// `[serve]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// HTTP port number (the server binds 127.0.0.1 only).
    pub port: u16,
    /// Event stream port.
    pub events_port: u16,
    /// Enable file watcher for live reload.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 5277,
            events_port: 35730,
            watch: true,
        }
    }
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Browser executable; searched on PATH when unset.
    pub browser: Option<String>,
    /// Upper bound for one render.
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: None,
            timeout_secs: 60,
        }
    }
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// `pdftotext` compatible executable.
    pub command: String,
    /// Upper bound for one extraction.
    pub timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            command: "pdftotext".to_string(),
            timeout_secs: 30,
        }
    }
}

/// `[lifecycle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Debounce window for file changes.
    pub debounce_ms: u64,
    /// Keepalive interval per event stream subscriber.
    pub keepalive_secs: u64,
    /// Delay between the last subscriber leaving and shutdown.
    pub idle_grace_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            keepalive_secs: 30,
            idle_grace_ms: 5000,
        }
    }
}

impl LifecycleConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub const fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }
}

impl PreviewConfig {
    /// Load configuration from CLI arguments.
    ///
    /// The config file is optional; defaults apply when it is absent.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => crate::utils::path::normalize_path(root),
            None => std::env::current_dir().context("Failed to get current working directory")?,
        };
        let config_path = root.join(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        config.root = root;
        if let Some(args) = cli.serve_args() {
            config.apply_serve_args(args);
        }
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (config, _) = Self::parse_with_ignored(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            let display_path = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "unknown fields in {} ignored: {}", display_path, ignored.join(", "));
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// CLI flags override file values.
    fn apply_serve_args(&mut self, args: &ServeArgs) {
        if let Some(port) = args.port {
            self.serve.port = port;
        }
        if let Some(port) = args.events_port {
            self.serve.events_port = port;
        }
        if let Some(watch) = args.watch {
            self.serve.watch = watch;
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serve.port == self.serve.events_port {
            return Err(ConfigError::Validation(format!(
                "serve.port and serve.events_port must differ (both {})",
                self.serve.port
            )));
        }
        if self.render.timeout_secs == 0 {
            return Err(ConfigError::Validation("render.timeout_secs must be > 0".into()));
        }
        if self.extract.timeout_secs == 0 {
            return Err(ConfigError::Validation("extract.timeout_secs must be > 0".into()));
        }
        if self.extract.command.trim().is_empty() {
            return Err(ConfigError::Validation("extract.command must not be empty".into()));
        }
        if self.lifecycle.keepalive_secs == 0 {
            return Err(ConfigError::Validation("lifecycle.keepalive_secs must be > 0".into()));
        }
        Ok(())
    }

    pub const fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render.timeout_secs)
    }

    pub const fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract.timeout_secs)
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> PreviewConfig {
    let (parsed, ignored) = PreviewConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
