//! TOML configuration for castbridge.
//!
//! Every section has serde defaults so a partial (or absent) config file is
//! always usable. Equalizer gains are validated to the [-10, 10] range the
//! filter builder expects.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::stream::EqualizerGains;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub equalizer: EqualizerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address advertised to the playback client in stream URLs.
    /// Auto-detected when unset.
    #[serde(default)]
    pub advertise_host: Option<String>,

    /// Fixed port for the remote-control sub-server.
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
}

/// Per-band equalizer gains in dB, each within [-10, 10].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct EqualizerConfig {
    #[serde(default)]
    pub low: i32,

    #[serde(default)]
    pub mid: i32,

    #[serde(default)]
    pub high: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Custom path to the ffmpeg binary (searched in PATH when unset).
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Custom path to the ffprobe binary (searched in PATH when unset).
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Advance to the next playlist entry automatically.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,

    /// Seconds an image is held before autoplay advances.
    #[serde(default = "default_image_display_secs")]
    pub image_display_secs: u64,
}

fn default_remote_port() -> u16 {
    8080
}

fn default_autoplay() -> bool {
    true
}

fn default_image_display_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            advertise_host: None,
            remote_port: default_remote_port(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: default_autoplay(),
            image_display_secs: default_image_display_secs(),
        }
    }
}

impl EqualizerConfig {
    /// Convert to validated [`EqualizerGains`].
    pub fn gains(&self) -> Result<EqualizerGains> {
        EqualizerGains::new(self.low, self.mid, self.high)
    }
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.equalizer.gains()?;
        if let Some(ref host) = self.server.advertise_host {
            if host.is_empty() {
                return Err(Error::Validation(
                    "server.advertise_host must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config: Config = toml::from_str(&raw)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Load a config file if a path is given, otherwise fall back to defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::default()),
    }
}
