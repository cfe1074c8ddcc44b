//! Target Selector
//!
//! `select` reduces one tick's blobs to at most one target. The only
//! state carried across ticks is the previous selection's position, used
//! by the age heuristic.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ConfigError;
use crate::detect::Blob;
use crate::target::occlusion::{self, OcclusionConfig};
use crate::target::{Target, TargetClass};

/// How the selector orders eligible candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPriority {
    /// Closest aim point to the aim origin wins
    Nearest,
    /// Head candidates beat body candidates, distance breaks ties
    HeadFirst,
}

/// Selector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Maximum distance from the aim origin for a candidate to be
    /// eligible, in pixels
    #[serde(default = "default_fov_radius")]
    pub fov_radius: f32,

    /// Candidate ordering
    #[serde(default = "default_priority")]
    pub priority: SelectionPriority,

    /// Fraction of a blob's height forming the head band
    #[serde(default = "default_head_band_fraction")]
    pub head_band_fraction: f32,

    /// Maximum distance between successive selections for the age
    /// counter to keep counting, in pixels
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: f32,

    /// Occlusion and shape thresholds
    #[serde(default)]
    pub occlusion: OcclusionConfig,
}

fn default_fov_radius() -> f32 {
    120.0
}
fn default_priority() -> SelectionPriority {
    SelectionPriority::Nearest
}
fn default_head_band_fraction() -> f32 {
    0.25
}
fn default_match_tolerance() -> f32 {
    24.0
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fov_radius: default_fov_radius(),
            priority: default_priority(),
            head_band_fraction: default_head_band_fraction(),
            match_tolerance: default_match_tolerance(),
            occlusion: OcclusionConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fov_radius <= 0.0 {
            return Err(ConfigError::invalid("selection.fov_radius", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.head_band_fraction) {
            return Err(ConfigError::invalid(
                "selection.head_band_fraction",
                "must be within 0..=1",
            ));
        }
        if self.match_tolerance < 0.0 {
            return Err(ConfigError::invalid(
                "selection.match_tolerance",
                "must not be negative",
            ));
        }
        self.occlusion.validate()
    }
}

/// One aim-point candidate derived from a blob.
struct Candidate {
    position: (f32, f32),
    class: TargetClass,
    distance: f32,
    blob_index: usize,
}

/// Reduces blobs to zero or one target per tick.
#[derive(Debug, Default)]
pub struct TargetSelector {
    last_position: Option<(f32, f32)>,
    age: u32,
}

impl TargetSelector {
    /// Create a selector with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose this tick's target, or none.
    ///
    /// `occluders` are the blobs matched by the occluder color range.
    /// Occluded candidates are excluded entirely.
    pub fn select(
        &mut self,
        blobs: &[Blob],
        occluders: &[Blob],
        cfg: &SelectionConfig,
        origin: (f32, f32),
    ) -> Option<Target> {
        let mut candidates: Vec<Candidate> = Vec::new();

        for (i, blob) in blobs.iter().enumerate() {
            if !occlusion::is_plausible_shape(blob, &cfg.occlusion) {
                trace!(bounds = ?blob.bounds, "blob rejected by shape gate");
                continue;
            }
            if occlusion::is_occluded(blob, occluders, &cfg.occlusion) {
                trace!(bounds = ?blob.bounds, "blob rejected as occluded");
                continue;
            }

            let head_y =
                blob.bounds.y as f32 + blob.bounds.height as f32 * cfg.head_band_fraction / 2.0;
            let head = (blob.centroid.0, head_y);
            let body = blob.centroid;

            for (position, class) in [(head, TargetClass::Head), (body, TargetClass::Body)] {
                let distance = hypot(position, origin);
                if distance <= cfg.fov_radius {
                    candidates.push(Candidate {
                        position,
                        class,
                        distance,
                        blob_index: i,
                    });
                }
            }
        }

        let chosen = match cfg.priority {
            SelectionPriority::Nearest => nearest(&candidates),
            SelectionPriority::HeadFirst => candidates
                .iter()
                .filter(|c| c.class == TargetClass::Head)
                .min_by(|a, b| a.distance.total_cmp(&b.distance))
                .or_else(|| nearest(&candidates)),
        };

        let Some(chosen) = chosen else {
            self.last_position = None;
            self.age = 0;
            return None;
        };

        self.age = match self.last_position {
            Some(prev) if hypot(chosen.position, prev) <= cfg.match_tolerance => self.age + 1,
            _ => 0,
        };
        self.last_position = Some(chosen.position);

        let bounds = blobs[chosen.blob_index].bounds;
        Some(Target {
            position: chosen.position,
            class: chosen.class,
            distance: chosen.distance,
            bounds,
            age: self.age,
            band: (bounds.y as f32, bounds.bottom() as f32),
        })
    }
}

fn nearest<'a>(candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    candidates.iter().min_by(|a, b| a.distance.total_cmp(&b.distance))
}

fn hypot(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Rect;

    fn blob_at(cx: f32, cy: f32, w: u32, h: u32) -> Blob {
        Blob {
            bounds: Rect {
                x: (cx - w as f32 / 2.0) as u32,
                y: (cy - h as f32 / 2.0) as u32,
                width: w,
                height: h,
            },
            centroid: (cx, cy),
            area: w * h / 2,
            confidence: 0.5,
        }
    }

    const ORIGIN: (f32, f32) = (100.0, 100.0);

    #[test]
    fn test_no_blobs_no_target() {
        let mut selector = TargetSelector::new();
        assert!(selector
            .select(&[], &[], &SelectionConfig::default(), ORIGIN)
            .is_none());
    }

    #[test]
    fn test_nearest_wins() {
        let mut selector = TargetSelector::new();
        let blobs = vec![blob_at(160.0, 100.0, 10, 20), blob_at(110.0, 100.0, 10, 20)];
        let target = selector
            .select(&blobs, &[], &SelectionConfig::default(), ORIGIN)
            .unwrap();
        assert!((target.position.0 - 110.0).abs() < 6.0);
    }

    #[test]
    fn test_fov_gating() {
        let mut selector = TargetSelector::new();
        let mut cfg = SelectionConfig::default();
        cfg.fov_radius = 30.0;
        let blobs = vec![blob_at(160.0, 100.0, 10, 20)];
        assert!(selector.select(&blobs, &[], &cfg, ORIGIN).is_none());
    }

    #[test]
    fn test_occluded_target_never_selected() {
        let mut selector = TargetSelector::new();
        let blobs = vec![blob_at(110.0, 100.0, 10, 20)];
        let smoke = vec![blob_at(110.0, 100.0, 60, 60)];
        assert!(selector
            .select(&blobs, &smoke, &SelectionConfig::default(), ORIGIN)
            .is_none());
    }

    #[test]
    fn test_head_first_prefers_head_band() {
        let mut selector = TargetSelector::new();
        let mut cfg = SelectionConfig::default();
        cfg.priority = SelectionPriority::HeadFirst;
        let blobs = vec![blob_at(100.0, 120.0, 12, 40)];
        let target = selector.select(&blobs, &[], &cfg, ORIGIN).unwrap();
        assert_eq!(target.class, TargetClass::Head);
        // Head point sits in the top quarter of the blob.
        assert!(target.position.1 < 110.0);
    }

    #[test]
    fn test_age_counts_stable_position() {
        let mut selector = TargetSelector::new();
        let cfg = SelectionConfig::default();
        let blobs = vec![blob_at(110.0, 100.0, 10, 20)];

        let t0 = selector.select(&blobs, &[], &cfg, ORIGIN).unwrap();
        assert_eq!(t0.age, 0);
        let t1 = selector.select(&blobs, &[], &cfg, ORIGIN).unwrap();
        assert_eq!(t1.age, 1);

        // A jump beyond the tolerance resets the counter.
        let moved = vec![blob_at(170.0, 100.0, 10, 20)];
        let t2 = selector.select(&moved, &[], &cfg, ORIGIN).unwrap();
        assert_eq!(t2.age, 0);
    }

    #[test]
    fn test_band_covers_blob_extent() {
        let mut selector = TargetSelector::new();
        let blobs = vec![blob_at(110.0, 100.0, 10, 20)];
        let target = selector
            .select(&blobs, &[], &SelectionConfig::default(), ORIGIN)
            .unwrap();
        assert!(target.band_contains(100.0));
        assert!(!target.band_contains(150.0));
    }
}
