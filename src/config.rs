// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! Persists daemon settings, the fan channel layout and the profile store
//! to TOML. Default path: `/etc/fanctl/config.toml`

use crate::profile::ProfileStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fanctl/config.toml";

/// Default daemon socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/run/fanctl.sock";

/// Default control loop period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Fan channels, indexed by position. Empty means auto-discover.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    /// Profiles and their channel/app assignments.
    #[serde(default = "ProfileStore::with_defaults")]
    pub store: ProfileStore,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Control loop period, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Path for the Unix domain socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Whether to restore fans to automatic on daemon exit.
    #[serde(default = "default_true")]
    pub restore_on_exit: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            restore_on_exit: true,
        }
    }
}

/// One physical fan and the sensor that drives it.
///
/// File names are relative to the hwmon device directory whose `name`
/// file matches `hwmon`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Display name
    pub name: String,
    /// hwmon device name, e.g. "steamdeck_hwmon"
    pub hwmon: String,
    #[serde(default = "default_fan_input")]
    pub fan_input: String,
    #[serde(default = "default_pwm")]
    pub pwm: String,
    #[serde(default = "default_pwm_enable")]
    pub pwm_enable: String,
    #[serde(default = "default_temp_input")]
    pub temp_input: String,
    /// RPM at 100% duty; read from `fanN_max` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rpm: Option<u32>,
}

impl ChannelConfig {
    /// Channel using the first fan and sensor of a hwmon device.
    pub fn for_device(name: &str, hwmon: &str) -> Self {
        Self {
            name: name.to_string(),
            hwmon: hwmon.to_string(),
            fan_input: default_fan_input(),
            pwm: default_pwm(),
            pwm_enable: default_pwm_enable(),
            temp_input: default_temp_input(),
            max_rpm: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            channels: Vec::new(),
            store: ProfileStore::with_defaults(),
        }
    }
}

// ---------------------------------------------------------------------------
// Load / Save
// ---------------------------------------------------------------------------

/// Load config from a TOML file, or return the default if the file doesn't exist.
pub fn load_config(path: &Path) -> io::Result<Config> {
    if !path.exists() {
        log::info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse config: {e}"),
        )
    })?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Save config to a TOML file, creating parent directories if needed.
///
/// Writes go to a sibling temporary file that is renamed into place.
pub fn save_config(path: &Path, config: &Config) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize config: {e}"),
        )
    })?;

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    log::debug!("Saved config to {}", path.display());
    Ok(())
}

/// Resolve the config file path from CLI arg or default.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    cli_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_fan_input() -> String {
    "fan1_input".to_string()
}

fn default_pwm() -> String {
    "pwm1".to_string()
}

fn default_pwm_enable() -> String {
    "pwm1_enable".to_string()
}

fn default_temp_input() -> String {
    "temp1_input".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::FanPoint;
    use crate::profile::FanProfile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(cfg.store.get("silent").is_some());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[daemon]
poll_interval_ms = 500

[[channels]]
name = "cpu"
hwmon = "steamdeck_hwmon"
max_rpm = 7300
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.daemon.poll_interval_ms, 500);
        assert_eq!(cfg.daemon.socket_path, DEFAULT_SOCKET_PATH);
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].pwm_enable, "pwm1_enable");
        assert_eq!(cfg.channels[0].max_rpm, Some(7300));
        assert_eq!(cfg.store, ProfileStore::with_defaults());
    }

    #[test]
    fn test_save_then_load_preserves_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.channels.push(ChannelConfig::for_device("cpu", "steamdeck_hwmon"));
        cfg.store.add("game", FanProfile::fixed(65.0));
        cfg.store.add(
            "curvy",
            FanProfile::curve(vec![FanPoint::new(40.0, 20.0), FanPoint::new(80.0, 90.0)]),
        );
        cfg.store.assign(0, None, Some("curvy"));
        cfg.store.assign(0, Some("1091500"), Some("game"));

        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.store.assignment(0, Some("1091500")), Some("game"));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "daemon = [").unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
