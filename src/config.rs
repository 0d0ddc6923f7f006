use crate::adb::tracker::TrackerSettings;
use crate::adb::transport::{Endpoint, Timeouts, DEFAULT_ADB_PORT, DEFAULT_HOST};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = ".adbhostconfig";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `adb` executable used to start and stop the server; `~` is expanded
    pub adb_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_ADB_PORT,
            adb_path: "adb".to_string(),
        }
    }
}

/// Milliseconds; a read or write timeout of 0 blocks indefinitely
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5000,
            read_ms: 5000,
            write_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub reconnect_delay_ms: u64,
    pub restart_after_attempts: u32,
    pub long_format: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let settings = TrackerSettings::default();
        Self {
            reconnect_delay_ms: settings.reconnect_delay.as_millis() as u64,
            restart_after_attempts: settings.restart_after_attempts,
            long_format: settings.long_format,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub timeouts: TimeoutConfig,
    pub tracker: TrackerConfig,
    pub alias: HashMap<String, String>,
    /// Friendly names keyed by serial (`[device.<serial>]`)
    #[serde(rename = "device")]
    pub devices: HashMap<String, DeviceConfig>,
}

impl Config {
    /// Load `~/.adbhostconfig`, then apply environment overrides
    pub fn load() -> Self {
        let mut config = match Config::config_path() {
            Some(path) => Config::load_from_path(&path),
            None => {
                debug!("No home directory; using default config");
                Config::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Parse a config file; a missing or invalid file yields the defaults
    pub fn load_from_path(path: &Path) -> Self {
        debug!("Loading config from: {:?}", path);

        let Ok(content) = fs::read_to_string(path) else {
            debug!("No config file found or unable to read it");
            return Config::default();
        };

        match toml::from_str(&content) {
            Ok(config) => {
                debug!("Parsed config: {:?}", config);
                config
            }
            Err(e) => {
                warn!("Error parsing config file {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// `ADB_SERVER_HOST`, `ADB_SERVER_PORT` (or `ANDROID_ADB_SERVER_PORT`) and `ADB_PATH`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ADB_SERVER_HOST").filter(|h| !h.is_empty()) {
            debug!("Server host from environment: {}", host);
            self.server.host = host;
        }

        let port = lookup("ADB_SERVER_PORT").or_else(|| lookup("ANDROID_ADB_SERVER_PORT"));
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(port) if port > 0 => {
                    debug!("Server port from environment: {}", port);
                    self.server.port = port;
                }
                _ => warn!("Ignoring invalid server port from environment: {:?}", port),
            }
        }

        if let Some(path) = lookup("ADB_PATH").filter(|p| !p.is_empty()) {
            self.server.adb_path = path;
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.host.clone(), self.server.port)
    }

    pub fn adb_path(&self) -> String {
        shellexpand::tilde(&self.server.adb_path).into_owned()
    }

    pub fn timeouts(&self) -> Timeouts {
        let optional = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        Timeouts {
            connect: Duration::from_millis(self.timeouts.connect_ms.max(1)),
            read: optional(self.timeouts.read_ms),
            write: optional(self.timeouts.write_ms),
        }
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            reconnect_delay: Duration::from_millis(self.tracker.reconnect_delay_ms),
            restart_after_attempts: self.tracker.restart_after_attempts,
            long_format: self.tracker.long_format,
        }
    }

    pub fn resolve_alias(&self, command: &str) -> String {
        debug!("Resolving alias for: {}", command);
        self.alias
            .get(command)
            .cloned()
            .unwrap_or_else(|| command.to_string())
    }

    /// Friendly name for `serial`, matched case-insensitively: exact match, or
    /// the only configured serial it prefixes
    pub fn get_device_name(&self, serial: &str) -> Option<String> {
        let wanted = serial.to_lowercase();
        if let Some((_, device)) = self
            .devices
            .iter()
            .find(|(configured, _)| configured.to_lowercase() == wanted)
        {
            return device.name.clone();
        }
        let mut matches = self
            .devices
            .iter()
            .filter(|(configured, _)| configured.to_lowercase().starts_with(&wanted));
        match (matches.next(), matches.next()) {
            (Some((_, device)), None) => device.name.clone(),
            _ => None,
        }
    }
}
