//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the trmnl-config.toml file.
//! It provides a centralized way to configure the server, display geometry, cache and
//! refresh timing, the upstream fruit source and the layout bands.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "trmnl-config.toml";

/// Plugin identifier used when running in development mode without one
const DEV_PLUGIN_UUID: &str = "dev-uuid";

/// Configuration problems detected by [`Config::validate`].
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingKey(&'static str),

    #[error("invalid display dimensions: {0}")]
    InvalidDimensions(String),
}

/// Application configuration loaded from trmnl-config.toml
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Canvas size and typography
    pub display: DisplayConfig,
    /// Data cache settings
    pub cache: CacheConfig,
    /// Refresh hints sent to the device
    pub refresh: RefreshConfig,
    /// Upstream fruit API
    pub source: SourceConfig,
    /// Fixed layout bands
    pub layout: LayoutConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Development mode skips validation of required keys
    pub dev_mode: bool,
    /// Value of the `X-TRMNL-Plugin-UUID` response header
    pub plugin_uuid: Option<String>,
    /// TRMNL API key; required outside development mode
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Header title for items without a fruit shape
    pub title: String,
    /// TrueType/OpenType font; built-in bitmap fonts are used when unset or unreadable
    pub font_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    pub ttl_seconds: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Base refresh interval suggested to the device
    pub interval_seconds: u64,
    /// How often the displayed fruit is meant to rotate
    pub rotation_interval_seconds: Option<u64>,
    /// Refresh interval sent along with an error bitmap
    pub error_retry_seconds: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint returning a JSON array of fruit records
    pub url: String,
    /// Upper bound for one upstream request
    pub timeout_seconds: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub header_height: u32,
    pub footer_height: u32,
    pub padding: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            dev_mode: true,
            plugin_uuid: None,
            api_key: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 800,  // TRMNL OG panel
            height: 480, // TRMNL OG panel
            title: "Fruit of the Day".to_string(),
            font_path: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_seconds: 3600 }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            interval_seconds: 3600,
            rotation_interval_seconds: Some(86400),
            error_retry_seconds: 300,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            url: "https://www.fruityvice.com/api/fruit/all".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            header_height: 80,
            footer_height: 40,
            padding: 20,
        }
    }
}

impl LayoutConfig {
    /// Usable content area `(width, height)` between the header and footer bands.
    ///
    /// Returns `None` when the bands and padding leave no room on a canvas of
    /// the given size.
    pub fn content_dimensions(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let margins = self.padding.checked_mul(2)?;
        let content_width = width.checked_sub(margins)?;
        let content_height = height
            .checked_sub(self.header_height)?
            .checked_sub(self.footer_height)?
            .checked_sub(margins)?;
        if content_width == 0 || content_height == 0 {
            return None;
        }
        Some((content_width, content_height))
    }
}

impl Config {
    /// Load configuration from trmnl-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file format, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Check required keys and geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::InvalidDimensions(format!(
                "{}x{}",
                self.display.width, self.display.height
            )));
        }
        if self
            .layout
            .content_dimensions(self.display.width, self.display.height)
            .is_none()
        {
            return Err(ConfigError::InvalidDimensions(format!(
                "layout bands leave no content area on {}x{}",
                self.display.width, self.display.height
            )));
        }
        // Skip key validation in development mode
        if !self.server.dev_mode {
            if self.server.api_key.is_none() {
                return Err(ConfigError::MissingKey("api_key"));
            }
            if self.server.plugin_uuid.is_none() {
                return Err(ConfigError::MissingKey("plugin_uuid"));
            }
        }
        Ok(())
    }

    /// Refresh interval for a successful render: the base interval, shortened
    /// to the rotation interval when that is configured and smaller.
    pub fn refresh_seconds(&self) -> u64 {
        match self.refresh.rotation_interval_seconds {
            Some(rotation) => self.refresh.interval_seconds.min(rotation),
            None => self.refresh.interval_seconds,
        }
    }

    /// Plugin identifier for response headers.
    pub fn plugin_uuid(&self) -> &str {
        self.server.plugin_uuid.as_deref().unwrap_or(DEV_PLUGIN_UUID)
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
