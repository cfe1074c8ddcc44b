//! HSV Color Classification
//!
//! Pixel classification happens in HSV space because the target
//! signatures this pipeline tracks are hue-defined (a rendered outline
//! color, a particle-effect gray) and HSV keeps them stable under
//! brightness changes that wreck RGB thresholds.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A color in HSV space: hue in degrees [0, 360), saturation and value
/// in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees
    pub h: f32,
    /// Saturation
    pub s: f32,
    /// Value (brightness)
    pub v: f32,
}

/// Inclusive HSV classification range.
///
/// A hue band with `h_min > h_max` wraps through 0 (for reds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower hue bound in degrees
    pub h_min: f32,
    /// Upper hue bound in degrees
    pub h_max: f32,
    /// Lower saturation bound
    pub s_min: f32,
    /// Upper saturation bound
    pub s_max: f32,
    /// Lower value bound
    pub v_min: f32,
    /// Upper value bound
    pub v_max: f32,
}

impl HsvRange {
    /// Whether a color falls inside the range.
    #[inline]
    pub fn contains(&self, c: Hsv) -> bool {
        let hue_ok = if self.h_min <= self.h_max {
            c.h >= self.h_min && c.h <= self.h_max
        } else {
            // Band wraps through 0 degrees
            c.h >= self.h_min || c.h <= self.h_max
        };
        hue_ok
            && c.s >= self.s_min
            && c.s <= self.s_max
            && c.v >= self.v_min
            && c.v <= self.v_max
    }

    /// A representative color in the middle of the range, useful for
    /// rendering synthetic test scenes.
    pub fn center(&self) -> Hsv {
        let h = if self.h_min <= self.h_max {
            (self.h_min + self.h_max) / 2.0
        } else {
            ((self.h_min + self.h_max + 360.0) / 2.0) % 360.0
        };
        Hsv {
            h,
            s: (self.s_min + self.s_max) / 2.0,
            v: (self.v_min + self.v_max) / 2.0,
        }
    }

    /// Validate bounds. Hue must sit in [0, 360], saturation and value
    /// in [0, 1].
    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        let in_hue = |v: f32| (0.0..=360.0).contains(&v);
        if !in_hue(self.h_min) || !in_hue(self.h_max) {
            return Err(ConfigError::invalid(field, "hue bounds must be within 0..=360"));
        }
        if !in_unit(self.s_min) || !in_unit(self.s_max) || self.s_min > self.s_max {
            return Err(ConfigError::invalid(field, "saturation bounds must be ordered within 0..=1"));
        }
        if !in_unit(self.v_min) || !in_unit(self.v_max) || self.v_min > self.v_max {
            return Err(ConfigError::invalid(field, "value bounds must be ordered within 0..=1"));
        }
        Ok(())
    }
}

/// Convert an RGB pixel to HSV.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };

    Hsv { h, s, v: max }
}

/// Convert an HSV color back to RGB. Used when painting synthetic
/// scenes from a configured classification range.
pub fn hsv_to_rgb(c: Hsv) -> (u8, u8, u8) {
    let h = c.h.rem_euclid(360.0);
    let chroma = c.v * c.s;
    let x = chroma * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = c.v - chroma;

    let (r, g, b) = match h {
        h if h < 60.0 => (chroma, x, 0.0),
        h if h < 120.0 => (x, chroma, 0.0),
        h if h < 180.0 => (0.0, chroma, x),
        h if h < 240.0 => (0.0, x, chroma),
        h if h < 300.0 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    (
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_hues() {
        assert_eq!(rgb_to_hsv(255, 0, 0).h, 0.0);
        assert_eq!(rgb_to_hsv(0, 255, 0).h, 120.0);
        assert_eq!(rgb_to_hsv(0, 0, 255).h, 240.0);
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let c = rgb_to_hsv(128, 128, 128);
        assert_eq!(c.s, 0.0);
        assert!((c.v - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_range_contains() {
        let range = HsvRange {
            h_min: 280.0,
            h_max: 320.0,
            s_min: 0.4,
            s_max: 1.0,
            v_min: 0.3,
            v_max: 1.0,
        };
        assert!(range.contains(Hsv { h: 300.0, s: 0.8, v: 0.9 }));
        assert!(!range.contains(Hsv { h: 200.0, s: 0.8, v: 0.9 }));
        assert!(!range.contains(Hsv { h: 300.0, s: 0.1, v: 0.9 }));
    }

    #[test]
    fn test_range_wraps_through_zero() {
        let range = HsvRange {
            h_min: 350.0,
            h_max: 10.0,
            s_min: 0.0,
            s_max: 1.0,
            v_min: 0.0,
            v_max: 1.0,
        };
        assert!(range.contains(Hsv { h: 355.0, s: 0.5, v: 0.5 }));
        assert!(range.contains(Hsv { h: 5.0, s: 0.5, v: 0.5 }));
        assert!(!range.contains(Hsv { h: 180.0, s: 0.5, v: 0.5 }));
    }

    #[test]
    fn test_round_trip_center() {
        let range = HsvRange {
            h_min: 280.0,
            h_max: 320.0,
            s_min: 0.6,
            s_max: 1.0,
            v_min: 0.6,
            v_max: 1.0,
        };
        let (r, g, b) = hsv_to_rgb(range.center());
        assert!(range.contains(rgb_to_hsv(r, g, b)));
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut range = HsvRange {
            h_min: 0.0,
            h_max: 400.0,
            s_min: 0.0,
            s_max: 1.0,
            v_min: 0.0,
            v_max: 1.0,
        };
        assert!(range.validate("detection.target_color").is_err());
        range.h_max = 360.0;
        range.s_min = 0.9;
        range.s_max = 0.1;
        assert!(range.validate("detection.target_color").is_err());
    }
}
