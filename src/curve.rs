// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Piecewise-linear fan curve evaluation.
//!
//! A curve is the user's points bracketed by two fixed anchors,
//! `(TEMP_MIN, SPEED_MIN)` and `(TEMP_MAX, SPEED_MAX)`. Between consecutive
//! points the speed is linearly interpolated.

use crate::point::FanPoint;
use std::cmp::Ordering;
use std::iter;

/// Order points by ascending temperature, ties by ascending speed.
pub fn point_order(a: &FanPoint, b: &FanPoint) -> Ordering {
    a.temp_c
        .total_cmp(&b.temp_c)
        .then(a.speed_pct.total_cmp(&b.speed_pct))
}

/// Sort points in place into evaluation order. The sort is stable.
pub fn sort_points(points: &mut [FanPoint]) {
    points.sort_by(point_order);
}

/// Evaluate the fan speed (percent) for a temperature.
///
/// `points` must already be in [`point_order`]. Segments are half-open on
/// the left, `(a.temp_c, b.temp_c]`:
///
/// - Inside a segment: linear interpolation
/// - Zero-width segment (duplicate temperature) hit exactly: the speed of its
///   upper end
/// - At or below the low anchor: the low anchor's speed
/// - Above the high anchor: the high anchor's speed
///
/// Returns `None` only when no rule applies (a NaN temperature); callers
/// hold their previous set point in that case.
pub fn evaluate(points: &[FanPoint], temp_c: f64) -> Option<f64> {
    if temp_c.is_nan() {
        return None;
    }

    let low = FanPoint::anchor_low();
    let high = FanPoint::anchor_high();

    let mut lo = low;
    for hi in points.iter().copied().chain(iter::once(high)) {
        let a = lo;
        lo = hi;

        if a.temp_c < hi.temp_c {
            if temp_c > a.temp_c && temp_c <= hi.temp_c {
                let frac = (temp_c - a.temp_c) / (hi.temp_c - a.temp_c);
                return Some(a.speed_pct + frac * (hi.speed_pct - a.speed_pct));
            }
        } else if a.temp_c == hi.temp_c && temp_c == hi.temp_c {
            return Some(hi.speed_pct);
        }
    }

    if temp_c <= low.temp_c {
        return Some(low.speed_pct);
    }
    if temp_c > high.temp_c {
        return Some(high.speed_pct);
    }

    None
}

/// Validate that curve points are in evaluation order.
pub fn validate(points: &[FanPoint]) -> Result<(), String> {
    for (i, pair) in points.windows(2).enumerate() {
        if point_order(&pair[0], &pair[1]) == Ordering::Greater {
            return Err(format!(
                "Points must be sorted by ascending temperature (point {})",
                i + 1
            ));
        }
    }
    Ok(())
}

/// A default "silent" curve: barely audible until 50C, full speed near 90C.
pub fn default_silent_points() -> Vec<FanPoint> {
    vec![
        FanPoint::new(40.0, 0.0),
        FanPoint::new(50.0, 25.0),
        FanPoint::new(70.0, 60.0),
        FanPoint::new(80.0, 80.0),
        FanPoint::new(90.0, 100.0),
    ]
}

/// A default "performance" curve: always some airflow, aggressive ramp.
pub fn default_performance_points() -> Vec<FanPoint> {
    vec![
        FanPoint::new(30.0, 25.0),
        FanPoint::new(50.0, 50.0),
        FanPoint::new(65.0, 80.0),
        FanPoint::new(75.0, 100.0),
    ]
}
