//! Configuration and settings management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Page sizes offered by the browser.
pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 50, 100];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub name: String,
    pub database_path: String,
    #[serde(default = "default_map_size_gb")]
    pub map_size_gb: u64,
}

impl ConnectionConfig {
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).to_string())
    }

    pub fn map_size_bytes(&self) -> usize {
        usize::try_from(self.map_size_gb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1 << 30)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_hide_key_prefix")]
    pub hide_key_prefix: bool,
    #[serde(default = "default_auto_refresh_secs")]
    pub auto_refresh_secs: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            hide_key_prefix: default_hide_key_prefix(),
            auto_refresh_secs: default_auto_refresh_secs(),
        }
    }
}

fn default_map_size_gb() -> u64 {
    1
}

fn default_page_size() -> usize {
    20
}

fn default_hide_key_prefix() -> bool {
    true
}

fn default_auto_refresh_secs() -> u64 {
    5
}

/// Raw connection form input, validated into a [`ConnectionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDraft {
    pub name: String,
    pub database_path: String,
    pub map_size_gb: String,
}

impl Default for ConnectionDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            database_path: String::new(),
            map_size_gb: default_map_size_gb().to_string(),
        }
    }
}

impl ConnectionDraft {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            database_path: config.database_path.clone(),
            map_size_gb: config.map_size_gb.to_string(),
        }
    }

    pub fn validate(&self) -> Result<ConnectionConfig> {
        let name = self.name.trim();
        let database_path = self.database_path.trim();
        let map_size = self.map_size_gb.trim();

        if name.is_empty() {
            bail!("Connection name cannot be empty");
        }
        if database_path.is_empty() {
            bail!("Database path cannot be empty");
        }
        if map_size.is_empty() {
            bail!("Map size cannot be empty");
        }
        let map_size_gb = match map_size.parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => bail!("Map size must be a positive integer"),
        };

        Ok(ConnectionConfig {
            name: name.to_string(),
            database_path: database_path.to_string(),
            map_size_gb,
        })
    }
}

impl Settings {
    /// Load settings from a file, or return defaults if file doesn't exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lmdbview");

        config_dir.join("settings.toml")
    }

    pub fn find_connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.iter().find(|c| c.name == name)
    }

    pub fn add_connection(&mut self, connection: ConnectionConfig) {
        self.connections.push(connection);
    }

    pub fn update_connection(&mut self, index: usize, connection: ConnectionConfig) -> Result<()> {
        match self.connections.get_mut(index) {
            Some(slot) => {
                *slot = connection;
                Ok(())
            }
            None => bail!("No connection at index {}", index),
        }
    }

    pub fn remove_connection(&mut self, index: usize) -> Result<ConnectionConfig> {
        if index >= self.connections.len() {
            bail!("No connection at index {}", index);
        }
        Ok(self.connections.remove(index))
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("APPDATA").map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
