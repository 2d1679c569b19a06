// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The hardware-facing side of the control loop.
//!
//! Every call is independent and may fail; the control loop decides what a
//! failure means. Channels are physical fan indices `0..channel_count()`.

use std::future::Future;
use std::io;

/// Raw temperature readings are millidegrees Celsius.
pub const TEMP_SCALE: f64 = 1000.0;

/// Fan sensing and actuation for one device.
pub trait FanBackend: Send + Sync {
    /// Number of controllable fans.
    fn channel_count(&self) -> usize;

    /// Current fan speed in RPM.
    fn fan_rpm(&self, channel: usize) -> impl Future<Output = io::Result<u32>> + Send;

    /// Raw temperature reading; divide by [`TEMP_SCALE`] for Celsius.
    fn fan_temperature(&self, channel: usize) -> impl Future<Output = io::Result<i64>> + Send;

    /// RPM corresponding to 100% speed.
    fn fan_max_rpm(&self, channel: usize) -> impl Future<Output = io::Result<u32>> + Send;

    /// Whether software control of this fan is supported at all.
    fn fan_is_adapted(&self, channel: usize) -> impl Future<Output = io::Result<bool>> + Send;

    /// Hand the fan to the hardware governor (`true`) or take manual
    /// control (`false`).
    fn set_fan_auto(&self, channel: usize, enabled: bool)
    -> impl Future<Output = io::Result<()>> + Send;

    /// Command a speed in percent. Only meaningful under manual control.
    fn set_fan_percent(&self, channel: usize, percent: f64)
    -> impl Future<Output = io::Result<()>> + Send;
}
