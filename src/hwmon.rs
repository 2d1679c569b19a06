// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! hwmon sysfs discovery and control.
//!
//! Locates configured fan channels under `/sys/class/hwmon/` and implements
//! [`FanBackend`] by reading and writing their sysfs attributes.

use crate::backend::FanBackend;
use crate::config::ChannelConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default sysfs hwmon class directory.
pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// `pwmN_enable` value for manual duty control.
const PWM_ENABLE_MANUAL: u8 = 1;
/// `pwmN_enable` value for firmware-governed control.
const PWM_ENABLE_AUTO: u8 = 2;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A configured fan channel resolved against sysfs.
#[derive(Debug, Clone)]
pub struct HwmonChannel {
    /// Display name from config
    pub name: String,
    /// hwmon device directory, `None` when the device was not found
    pub dir: Option<PathBuf>,
    pub rpm_path: PathBuf,
    pub temp_path: PathBuf,
    pub pwm_path: PathBuf,
    pub pwm_enable_path: PathBuf,
    /// `fanN_max`, consulted when no max RPM is configured
    pub max_rpm_path: PathBuf,
    pub max_rpm: Option<u32>,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Scan a hwmon root and describe every PWM-capable fan as a channel.
///
/// Each fan is paired with the first temperature sensor of its device.
pub fn discover_channels(root: &Path) -> io::Result<Vec<ChannelConfig>> {
    let mut channels = Vec::new();

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    dirs.sort();

    for hwmon_dir in dirs {
        let hwmon_name = read_trimmed(&hwmon_dir.join("name")).unwrap_or_default();

        // Look for pwmN files (N = 1, 2, 3, ...)
        for n in 1..=16 {
            let pwm = format!("pwm{n}");
            let pwm_enable = format!("pwm{n}_enable");
            if !hwmon_dir.join(&pwm).exists() {
                break;
            }
            if !hwmon_dir.join(&pwm_enable).exists() {
                continue;
            }

            let label = read_trimmed(&hwmon_dir.join(format!("fan{n}_label")))
                .unwrap_or_else(|| format!("{hwmon_name} fan{n}"));

            channels.push(ChannelConfig {
                name: label,
                hwmon: hwmon_name.clone(),
                fan_input: format!("fan{n}_input"),
                pwm,
                pwm_enable,
                temp_input: "temp1_input".to_string(),
                max_rpm: None,
            });
        }
    }

    Ok(channels)
}

/// Find the directory of the hwmon device with the given `name`.
pub fn find_device(root: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|dir| read_trimmed(&dir.join("name")).as_deref() == Some(name))
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Resolve configured channels to sysfs paths.
pub fn resolve_channels(root: &Path, configs: &[ChannelConfig]) -> Vec<HwmonChannel> {
    configs
        .iter()
        .map(|cfg| {
            let dir = find_device(root, &cfg.hwmon);
            if dir.is_none() {
                log::warn!("Channel '{}': hwmon device '{}' not found", cfg.name, cfg.hwmon);
            }
            let base = dir.clone().unwrap_or_default();
            let max_name = cfg.fan_input.replace("_input", "_max");

            HwmonChannel {
                name: cfg.name.clone(),
                rpm_path: base.join(&cfg.fan_input),
                temp_path: base.join(&cfg.temp_input),
                pwm_path: base.join(&cfg.pwm),
                pwm_enable_path: base.join(&cfg.pwm_enable),
                max_rpm_path: base.join(max_name),
                max_rpm: cfg.max_rpm,
                dir,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// [`FanBackend`] over hwmon sysfs attributes.
#[derive(Debug, Clone)]
pub struct HwmonBackend {
    channels: Vec<HwmonChannel>,
}

impl HwmonBackend {
    pub fn new(channels: Vec<HwmonChannel>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[HwmonChannel] {
        &self.channels
    }

    fn channel(&self, channel: usize) -> io::Result<&HwmonChannel> {
        let ch = self.channels.get(channel).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("Unknown fan channel {channel}"))
        })?;
        if ch.dir.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Channel '{}' has no hwmon device", ch.name),
            ));
        }
        Ok(ch)
    }
}

impl FanBackend for HwmonBackend {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    async fn fan_rpm(&self, channel: usize) -> io::Result<u32> {
        let ch = self.channel(channel)?;
        read_value(&ch.rpm_path).await
    }

    async fn fan_temperature(&self, channel: usize) -> io::Result<i64> {
        let ch = self.channel(channel)?;
        read_value(&ch.temp_path).await
    }

    async fn fan_max_rpm(&self, channel: usize) -> io::Result<u32> {
        let ch = self.channel(channel)?;
        match ch.max_rpm {
            Some(rpm) => Ok(rpm),
            None => read_value(&ch.max_rpm_path).await,
        }
    }

    async fn fan_is_adapted(&self, channel: usize) -> io::Result<bool> {
        let Ok(ch) = self.channel(channel) else {
            return Ok(false);
        };
        Ok(tokio::fs::try_exists(&ch.pwm_path).await?
            && tokio::fs::try_exists(&ch.pwm_enable_path).await?)
    }

    async fn set_fan_auto(&self, channel: usize, enabled: bool) -> io::Result<()> {
        let ch = self.channel(channel)?;
        let mode = if enabled { PWM_ENABLE_AUTO } else { PWM_ENABLE_MANUAL };
        tokio::fs::write(&ch.pwm_enable_path, format!("{mode}")).await
    }

    async fn set_fan_percent(&self, channel: usize, percent: f64) -> io::Result<()> {
        let ch = self.channel(channel)?;
        tokio::fs::write(&ch.pwm_path, format!("{}", percent_to_pwm(percent))).await
    }
}

/// Convert a speed percentage to a PWM duty value (0-255).
pub fn percent_to_pwm(percent: f64) -> u8 {
    (percent.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

async fn read_value<T: std::str::FromStr>(path: &Path) -> io::Result<T> {
    let raw = tokio::fs::read_to_string(path).await?;
    raw.trim().parse::<T>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Unparseable value {:?} in {}", raw.trim(), path.display()),
        )
    })
}
