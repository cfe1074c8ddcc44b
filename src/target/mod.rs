//! Target Selection
//!
//! Reduces the detector's candidate blobs to zero or one active
//! [`Target`] per tick: field-of-view gating, head/body classification,
//! occlusion exclusion, and priority-based choice. Selection is
//! stateless across ticks except for the age counter.

pub mod occlusion;
pub mod selector;

pub use occlusion::OcclusionConfig;
pub use selector::{SelectionConfig, SelectionPriority, TargetSelector};

use crate::detect::Rect;

/// Vertical band a target was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    /// Upper band of the blob
    Head,
    /// Everything below the head band
    Body,
}

/// The chosen target for one tick.
///
/// At most one target is active per tick. There is no cross-frame
/// identity beyond the age heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Aim point in frame space
    pub position: (f32, f32),
    /// Band the aim point belongs to
    pub class: TargetClass,
    /// Distance from the aim origin to the aim point, in pixels
    pub distance: f32,
    /// Bounding box of the underlying blob
    pub bounds: Rect,
    /// Consecutive ticks this approximate position has been selected
    pub age: u32,
    /// Vertical extent (top, bottom) of the blob in frame space
    pub band: (f32, f32),
}

impl Target {
    /// Whether a frame-space y coordinate lies inside the vertical band.
    pub fn band_contains(&self, y: f32) -> bool {
        y >= self.band.0 && y <= self.band.1
    }
}
