// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Mapping between the curve domain and the editor's drawing surface.
//!
//! Temperature runs left to right, speed bottom to top (surface y grows
//! downward, so the speed axis is inverted).

use crate::point::{FanPoint, SPEED_MAX, TEMP_MAX};

/// Width of a point label, in surface units.
pub const LABEL_WIDTH: f64 = 55.0;
/// Height of a point label, in surface units.
pub const LABEL_HEIGHT: f64 = 12.0;
/// Gap kept between a label and its point or a surface edge.
pub const LABEL_MARGIN: f64 = 5.0;

/// A fixed-size drawing surface, at least one unit on each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    width: f64,
    height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Surface position of a domain point.
    pub fn to_canvas(&self, point: &FanPoint) -> (f64, f64) {
        let x = (point.temp_c * self.width / TEMP_MAX).clamp(0.0, self.width);
        let y = ((SPEED_MAX - point.speed_pct) * self.height / SPEED_MAX).clamp(0.0, self.height);
        (x, y)
    }

    /// Domain point under a surface position. Positions outside the surface
    /// land on its border.
    pub fn from_canvas(&self, x: f64, y: f64) -> FanPoint {
        let temp_c = (x * TEMP_MAX / self.width).clamp(0.0, TEMP_MAX);
        let speed_pct = ((self.height - y) * SPEED_MAX / self.height).clamp(0.0, SPEED_MAX);
        FanPoint::new(temp_c, speed_pct)
    }

    /// Offset from a point at `(x, y)` to the top-left corner of its label.
    ///
    /// The label sits up and to the right of the point. It mirrors to the
    /// left when it would come within [`LABEL_MARGIN`] of the right edge, and
    /// drops below the point when it would come within the margin of the top.
    pub fn label_offset(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = if x + LABEL_MARGIN + LABEL_WIDTH > self.width - LABEL_MARGIN {
            -(LABEL_MARGIN + LABEL_WIDTH)
        } else {
            LABEL_MARGIN
        };
        let dy = if y - LABEL_MARGIN - LABEL_HEIGHT < LABEL_MARGIN {
            LABEL_MARGIN
        } else {
            -(LABEL_MARGIN + LABEL_HEIGHT)
        };
        (dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_sizes_are_raised_to_one_unit() {
        let canvas = Canvas::new(-5.0, f64::NAN);
        assert_eq!((canvas.width(), canvas.height()), (1.0, 1.0));
        assert_eq!(canvas.to_canvas(&FanPoint::new(100.0, 0.0)), (1.0, 1.0));
        assert_eq!(canvas.from_canvas(-3.0, 4.0), FanPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_corners() {
        let canvas = Canvas::new(300.0, 200.0);
        assert_eq!(canvas.to_canvas(&FanPoint::new(0.0, 0.0)), (0.0, 200.0));
        assert_eq!(canvas.to_canvas(&FanPoint::new(100.0, 100.0)), (300.0, 0.0));
        assert_eq!(canvas.to_canvas(&FanPoint::new(50.0, 25.0)), (150.0, 150.0));
    }

    #[test]
    fn test_round_trip() {
        for (w, h) in [(300.0, 200.0), (1.0, 1.0), (1280.0, 333.0)] {
            let canvas = Canvas::new(w, h);
            let mut t = 0.0;
            while t <= 100.0 {
                let p = FanPoint::new(t, 100.0 - t * 0.7);
                let (x, y) = canvas.to_canvas(&p);
                let back = canvas.from_canvas(x, y);
                assert!((back.temp_c - p.temp_c).abs() < 1e-9);
                assert!((back.speed_pct - p.speed_pct).abs() < 1e-9);
                t += 7.5;
            }
        }
    }

    #[test]
    fn test_from_canvas_clamps_outside_positions() {
        let canvas = Canvas::new(300.0, 200.0);
        assert_eq!(canvas.from_canvas(-20.0, 500.0), FanPoint::new(0.0, 0.0));
        assert_eq!(canvas.from_canvas(900.0, -10.0), FanPoint::new(100.0, 100.0));
    }

    #[test]
    fn test_label_default_is_above_right() {
        let canvas = Canvas::new(300.0, 200.0);
        assert_eq!(
            canvas.label_offset(100.0, 100.0),
            (LABEL_MARGIN, -(LABEL_MARGIN + LABEL_HEIGHT))
        );
    }

    #[test]
    fn test_label_stays_inside_near_edges() {
        let canvas = Canvas::new(300.0, 200.0);
        for (x, y) in [(298.0, 2.0), (0.0, 0.0), (300.0, 200.0), (240.0, 21.0)] {
            let (dx, dy) = canvas.label_offset(x, y);
            let (lx, ly) = (x + dx, y + dy);
            assert!(lx >= 0.0 && lx + LABEL_WIDTH <= canvas.width, "x={x}");
            assert!(ly >= 0.0 && ly + LABEL_HEIGHT <= canvas.height, "y={y}");
        }
    }

    #[test]
    fn test_label_flips_below_near_top() {
        let canvas = Canvas::new(300.0, 200.0);
        let (_, dy) = canvas.label_offset(50.0, 3.0);
        assert_eq!(dy, LABEL_MARGIN);
    }
}
