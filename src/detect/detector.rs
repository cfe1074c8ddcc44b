//! Color Blob Detector
//!
//! Segments a frame by a configured HSV range and extracts connected
//! regions. The returned blobs are in no guaranteed order; the selector
//! re-sorts. Detection failures (short buffers, zero-sized frames)
//! degrade to an empty list so a bad frame can never abort a tick.
//!
//! The scan can be bounded to a square window around the aim origin:
//! eligible targets are field-of-view gated downstream anyway, so pixels
//! far outside the window only cost time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::capture::VideoFrame;
use crate::config::ConfigError;
use crate::detect::blob::{Blob, Rect};
use crate::detect::color::{rgb_to_hsv, HsvRange};

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum matched-pixel count for a region to become a blob
    #[serde(default = "default_min_area")]
    pub min_area: u32,

    /// Half-width of the square scan window around the aim origin.
    /// `None` scans the whole frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_radius: Option<u32>,

    /// HSV range of the target signature
    #[serde(default = "default_target_color")]
    pub target_color: HsvRange,

    /// HSV range of the occluder ("smoke") signature
    #[serde(default = "default_smoke_color")]
    pub smoke_color: HsvRange,
}

fn default_target_color() -> HsvRange {
    // Purple outline highlight
    HsvRange {
        h_min: 280.0,
        h_max: 320.0,
        s_min: 0.4,
        s_max: 1.0,
        v_min: 0.3,
        v_max: 1.0,
    }
}

fn default_smoke_color() -> HsvRange {
    // Desaturated mid-bright gray
    HsvRange {
        h_min: 0.0,
        h_max: 360.0,
        s_min: 0.0,
        s_max: 0.18,
        v_min: 0.45,
        v_max: 0.95,
    }
}

fn default_min_area() -> u32 {
    12
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_area: default_min_area(),
            roi_radius: None,
            target_color: default_target_color(),
            smoke_color: default_smoke_color(),
        }
    }
}

impl DetectionConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.target_color.validate("detection.target_color")?;
        self.smoke_color.validate("detection.smoke_color")?;
        if self.min_area == 0 {
            return Err(ConfigError::invalid("detection.min_area", "must be at least 1"));
        }
        Ok(())
    }
}

/// The scan window in frame coordinates: [x0, x1) x [y0, y1).
struct ScanWindow {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl ScanWindow {
    fn for_frame(frame: &VideoFrame, roi_radius: Option<u32>) -> Self {
        match roi_radius {
            None => Self {
                x0: 0,
                y0: 0,
                x1: frame.width,
                y1: frame.height,
            },
            Some(r) => {
                let (cx, cy) = frame.center();
                let (cx, cy) = (cx as u32, cy as u32);
                Self {
                    x0: cx.saturating_sub(r),
                    y0: cy.saturating_sub(r),
                    x1: (cx + r).min(frame.width),
                    y1: (cy + r).min(frame.height),
                }
            }
        }
    }

    fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

/// Segment `frame` by `range` and return the connected regions that pass
/// the minimum-area filter.
pub fn detect(frame: &VideoFrame, range: &HsvRange, cfg: &DetectionConfig) -> Vec<Blob> {
    if !frame.is_complete() {
        debug!(
            frame_id = frame.frame_id,
            "frame buffer shorter than declared geometry, skipping detection"
        );
        return Vec::new();
    }

    let window = ScanWindow::for_frame(frame, cfg.roi_radius);
    let (w, h) = (window.width() as usize, window.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    // Per-pixel classification into a binary mask, window-local coords.
    let mut mask = vec![false; w * h];
    for wy in 0..h {
        let fy = window.y0 + wy as u32;
        for wx in 0..w {
            let fx = window.x0 + wx as u32;
            let (r, g, b) = frame.rgb_at(fx, fy);
            if range.contains(rgb_to_hsv(r, g, b)) {
                mask[wy * w + wx] = true;
            }
        }
    }

    extract_regions(&mut mask, w, h, &window, cfg.min_area)
}

/// Grow 4-connected regions out of the mask. Visited pixels are cleared
/// in place, so the mask is consumed.
fn extract_regions(
    mask: &mut [bool],
    w: usize,
    h: usize,
    window: &ScanWindow,
    min_area: u32,
) -> Vec<Blob> {
    let mut blobs = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            if !mask[sy * w + sx] {
                continue;
            }

            // Flood from this seed.
            mask[sy * w + sx] = false;
            stack.push((sx, sy));

            let (mut min_x, mut min_y) = (sx, sy);
            let (mut max_x, mut max_y) = (sx, sy);
            let (mut sum_x, mut sum_y) = (0u64, 0u64);
            let mut count = 0u32;

            while let Some((x, y)) = stack.pop() {
                count += 1;
                sum_x += x as u64;
                sum_y += y as u64;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                if x > 0 && mask[y * w + x - 1] {
                    mask[y * w + x - 1] = false;
                    stack.push((x - 1, y));
                }
                if x + 1 < w && mask[y * w + x + 1] {
                    mask[y * w + x + 1] = false;
                    stack.push((x + 1, y));
                }
                if y > 0 && mask[(y - 1) * w + x] {
                    mask[(y - 1) * w + x] = false;
                    stack.push((x, y - 1));
                }
                if y + 1 < h && mask[(y + 1) * w + x] {
                    mask[(y + 1) * w + x] = false;
                    stack.push((x, y + 1));
                }
            }

            if count < min_area {
                continue;
            }

            let bounds = Rect {
                x: window.x0 + min_x as u32,
                y: window.y0 + min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            };
            blobs.push(Blob {
                bounds,
                centroid: (
                    window.x0 as f32 + sum_x as f32 / count as f32,
                    window.y0 as f32 + sum_y as f32 / count as f32,
                ),
                area: count,
                confidence: count as f32 / bounds.area() as f32,
            });
        }
    }

    blobs
}

/// Write the classification mask as a grayscale PNG. Diagnostic tooling,
/// never on the tick path.
pub fn write_mask_png(
    frame: &VideoFrame,
    range: &HsvRange,
    path: &Path,
) -> Result<(), image::ImageError> {
    let mut img = image::GrayImage::new(frame.width, frame.height);
    if frame.is_complete() {
        for y in 0..frame.height {
            for x in 0..frame.width {
                let (r, g, b) = frame.rgb_at(x, y);
                let lum = if range.contains(rgb_to_hsv(r, g, b)) { 255 } else { 0 };
                img.put_pixel(x, y, image::Luma([lum]));
            }
        }
    }
    img.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticScene, SyntheticSource};

    fn target_rgb(cfg: &DetectionConfig) -> (u8, u8, u8) {
        crate::detect::color::hsv_to_rgb(cfg.target_color.center())
    }

    #[test]
    fn test_single_square_yields_one_blob() {
        let cfg = DetectionConfig::default();
        let mut scene = SyntheticScene::new(64, 64);
        scene.add_centered_rect(20, 30, 8, 8, target_rgb(&cfg));
        let frame = SyntheticSource::render(&scene, 0);

        let blobs = detect(&frame, &cfg.target_color, &cfg);
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert_eq!(blob.area, 64);
        assert!((blob.centroid.0 - 19.5).abs() < 1.0);
        assert!((blob.centroid.1 - 29.5).abs() < 1.0);
        assert!(blob.confidence > 0.99);
    }

    #[test]
    fn test_disjoint_squares_yield_two_blobs() {
        let cfg = DetectionConfig::default();
        let mut scene = SyntheticScene::new(64, 64);
        let color = target_rgb(&cfg);
        scene.add_centered_rect(12, 12, 6, 6, color);
        scene.add_centered_rect(48, 48, 6, 6, color);
        let frame = SyntheticSource::render(&scene, 0);

        let blobs = detect(&frame, &cfg.target_color, &cfg);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn test_min_area_filters_specks() {
        let mut cfg = DetectionConfig::default();
        cfg.min_area = 10;
        let mut scene = SyntheticScene::new(32, 32);
        scene.add_centered_rect(16, 16, 2, 2, target_rgb(&cfg));
        let frame = SyntheticSource::render(&scene, 0);

        assert!(detect(&frame, &cfg.target_color, &cfg).is_empty());
    }

    #[test]
    fn test_short_buffer_degrades_to_empty() {
        use crate::capture::{PixelFormat, VideoFrame};
        use std::time::Instant;

        let cfg = DetectionConfig::default();
        let frame = VideoFrame::new(1, 64, 64, PixelFormat::Bgra8, vec![0u8; 16], Instant::now());
        assert!(detect(&frame, &cfg.target_color, &cfg).is_empty());
    }

    #[test]
    fn test_roi_excludes_far_blob() {
        let mut cfg = DetectionConfig::default();
        cfg.roi_radius = Some(10);
        let mut scene = SyntheticScene::new(64, 64);
        let color = target_rgb(&cfg);
        // One blob at center, one near the corner.
        scene.add_centered_rect(32, 32, 6, 6, color);
        scene.add_centered_rect(58, 58, 6, 6, color);
        let frame = SyntheticSource::render(&scene, 0);

        let blobs = detect(&frame, &cfg.target_color, &cfg);
        assert_eq!(blobs.len(), 1);
        assert!((blobs[0].centroid.0 - 31.5).abs() < 1.0);
    }
}
