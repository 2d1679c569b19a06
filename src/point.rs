// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Temperature / fan-speed points.
//!
//! A [`FanPoint`] is the unit of everything else in the crate: curve control
//! points, the live "now" sample and the commanded "set" sample. Both axes
//! are clamped into the domain on construction.

use serde::{Deserialize, Serialize};

/// Lowest representable temperature, degrees Celsius.
pub const TEMP_MIN: f64 = 0.0;
/// Highest representable temperature, degrees Celsius.
pub const TEMP_MAX: f64 = 100.0;
/// Lowest fan speed, percent.
pub const SPEED_MIN: f64 = 0.0;
/// Highest fan speed, percent.
pub const SPEED_MAX: f64 = 100.0;

/// Grid pitch used when a profile has snap-to-grid enabled.
pub const GRID_STEP: f64 = 5.0;

/// A single (temperature, fan speed) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawPoint")]
pub struct FanPoint {
    /// Temperature in degrees Celsius, within `TEMP_MIN..=TEMP_MAX`
    pub temp_c: f64,
    /// Fan speed in percent, within `SPEED_MIN..=SPEED_MAX`
    pub speed_pct: f64,
}

// Deserialized points go through the clamping constructor.
#[derive(Deserialize)]
struct RawPoint {
    temp_c: f64,
    speed_pct: f64,
}

impl From<RawPoint> for FanPoint {
    fn from(raw: RawPoint) -> Self {
        FanPoint::new(raw.temp_c, raw.speed_pct)
    }
}

impl FanPoint {
    /// Create a point, clamping both axes into the domain.
    ///
    /// NaN collapses to the lower bound of its axis.
    pub fn new(temp_c: f64, speed_pct: f64) -> Self {
        Self {
            temp_c: clamp_axis(temp_c, TEMP_MIN, TEMP_MAX),
            speed_pct: clamp_axis(speed_pct, SPEED_MIN, SPEED_MAX),
        }
    }

    /// Lower-left corner anchor of every curve.
    pub fn anchor_low() -> Self {
        Self::new(TEMP_MIN, SPEED_MIN)
    }

    /// Upper-right corner anchor of every curve.
    pub fn anchor_high() -> Self {
        Self::new(TEMP_MAX, SPEED_MAX)
    }

    /// Euclidean distance in (temperature, speed) space.
    pub fn distance(&self, other: &FanPoint) -> f64 {
        (self.temp_c - other.temp_c).hypot(self.speed_pct - other.speed_pct)
    }

    /// Whether `other` lies within `threshold` of this point.
    pub fn is_close(&self, other: &FanPoint, threshold: f64) -> bool {
        self.distance(other) <= threshold
    }

    /// Move this point in place, re-applying the domain clamp.
    pub fn set(&mut self, temp_c: f64, speed_pct: f64) {
        *self = FanPoint::new(temp_c, speed_pct);
    }

    /// Round both axes to the nearest multiple of [`GRID_STEP`].
    pub fn snapped(&self) -> Self {
        FanPoint::new(snap(self.temp_c), snap(self.speed_pct))
    }
}

fn clamp_axis(v: f64, min: f64, max: f64) -> f64 {
    if v.is_nan() { min } else { v.clamp(min, max) }
}

fn snap(v: f64) -> f64 {
    (v / GRID_STEP).round() * GRID_STEP
}
