//! Occlusion Filtering
//!
//! A candidate blob overlapped or surrounded by an occluder-colored blob
//! (a smoke or particle signature) is excluded from selection entirely,
//! not merely deprioritized: aiming at a target that is visually behind
//! smoke corrects toward something the operator cannot see.
//!
//! The same module carries the shape-plausibility gate: occluder residue
//! tends to produce wide, oversized regions, while real targets read
//! taller than wide. All thresholds are product-tuning values and are
//! therefore configuration, not constants.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::detect::Blob;

/// Occlusion and shape-gate thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcclusionConfig {
    /// Fraction of a blob's bounding box an occluder must cover for the
    /// blob to count as occluded
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f32,

    /// Maximum plausible blob width in pixels
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Maximum plausible blob height in pixels
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Maximum plausible width over height; wider blobs are treated as
    /// occluder residue
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f32,

    /// Maximum plausible matched-pixel density (1.0 disables the check)
    #[serde(default = "default_max_fill_ratio")]
    pub max_fill_ratio: f32,
}

fn default_overlap_ratio() -> f32 {
    0.4
}
fn default_max_width() -> u32 {
    110
}
fn default_max_height() -> u32 {
    140
}
fn default_max_aspect_ratio() -> f32 {
    1.5
}
fn default_max_fill_ratio() -> f32 {
    1.0
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            overlap_ratio: default_overlap_ratio(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_aspect_ratio: default_max_aspect_ratio(),
            max_fill_ratio: default_max_fill_ratio(),
        }
    }
}

impl OcclusionConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.overlap_ratio) {
            return Err(ConfigError::invalid(
                "selection.occlusion.overlap_ratio",
                "must be within 0..=1",
            ));
        }
        if self.max_aspect_ratio <= 0.0 {
            return Err(ConfigError::invalid(
                "selection.occlusion.max_aspect_ratio",
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_fill_ratio) {
            return Err(ConfigError::invalid(
                "selection.occlusion.max_fill_ratio",
                "must be within 0..=1",
            ));
        }
        Ok(())
    }
}

/// Whether an occluder blob covers enough of `blob` to exclude it.
pub fn is_occluded(blob: &Blob, occluders: &[Blob], cfg: &OcclusionConfig) -> bool {
    let blob_area = blob.bounds.area();
    if blob_area == 0 {
        return true;
    }
    occluders.iter().any(|occ| {
        let covered = blob.bounds.overlap_area(&occ.bounds) as f32 / blob_area as f32;
        covered >= cfg.overlap_ratio
    })
}

/// Shape gate: oversized or wide-and-dense regions read as occluder
/// residue rather than targets.
pub fn is_plausible_shape(blob: &Blob, cfg: &OcclusionConfig) -> bool {
    let w = blob.bounds.width;
    let h = blob.bounds.height;
    if w == 0 || h == 0 {
        return false;
    }
    if w > cfg.max_width || h > cfg.max_height {
        return false;
    }
    // Clearly taller than wide is always plausible.
    if h as f32 > w as f32 * 1.5 {
        return true;
    }
    if blob.aspect_ratio() > cfg.max_aspect_ratio {
        return false;
    }
    if blob.confidence > cfg.max_fill_ratio {
        return false;
    }
    true
}
