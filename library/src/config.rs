//! Launcher configuration (config.toml)
//!
//! Settings live in the platform-specific config directory and are applied
//! as the process-wide launch defaults before every run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use retrolaunch_core::{CacheOptions, LaunchOptions, PollConfig, Size};
use retrolaunch_shared::ConfigMap;
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// Launcher configuration.
///
/// Every section is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra frontend settings, layered over the built-in ones
    pub retroarch: ConfigMap,
    /// Core options
    pub retroarch_core: ConfigMap,
    /// Per-field identity cache switches; unset fields keep the built-in choice
    pub cache: CacheOptions,
    /// Output polling timings
    pub poll: PollConfig,
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Core used when a run names none
    pub core: Option<String>,
    /// Listen for keyboard input on the whole document rather than the surface
    pub respond_to_global_events: bool,
    /// Canvas size to request at launch
    pub size: Option<Size>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            core: None,
            respond_to_global_events: true,
            size: None,
        }
    }
}

impl Config {
    /// The part of the configuration that becomes global launch defaults.
    pub fn launch_options(&self) -> LaunchOptions {
        let mut options = LaunchOptions::new();
        options.retroarch_config = self.retroarch.clone();
        options.retroarch_core_config = self.retroarch_core.clone();
        options.cache = self.cache;
        options.poll = Some(self.poll);
        options.respond_to_global_events = Some(self.launch.respond_to_global_events);
        options.size = self.launch.size;
        options
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Retrolaunch\config`
/// On macOS: `~/Library/Application Support/io.retrolaunch.Retrolaunch`
/// On Linux: `~/.config/Retrolaunch`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.retrolaunch", "", "Retrolaunch")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the configuration from the platform config directory.
///
/// A missing file yields the defaults; a malformed one is an error so typos
/// do not silently reset settings.
pub fn load() -> Result<Config> {
    match config_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Saves the configuration, creating the directory if needed.
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes the default configuration to `path`.
///
/// An existing file is left alone unless `force` is set. Returns whether the
/// file was written.
pub fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    save_to(&Config::default(), path)?;
    tracing::info!(path = %path.display(), "default configuration written");
    Ok(true)
}
