//! NCAF Mode (snap radius)
//!
//! Three concentric rings around the aim origin. Inside the snap radius
//! the full corrective delta fires in one tick, bypassing smoothing
//! entirely. Between snap and near radius, smoothing ramps in
//! proportionally to distance. Outside the near radius the mode is a
//! no-op.

use serde::{Deserialize, Serialize};

use crate::aim::{AimConfig, AimInput, StepAccumulator};
use crate::config::ConfigError;

/// NCAF mode section
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NcafConfig {
    /// Inner ring: full delta, no smoothing, in pixels
    #[serde(default = "default_snap_radius")]
    pub snap_radius: f32,

    /// Outer ring: graduated smoothing, in pixels
    #[serde(default = "default_near_radius")]
    pub near_radius: f32,

    /// Smoothing divisor reached at the near radius
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_snap_radius() -> f32 {
    10.0
}
fn default_near_radius() -> f32 {
    45.0
}
fn default_smoothing() -> f32 {
    6.0
}

impl Default for NcafConfig {
    fn default() -> Self {
        Self {
            snap_radius: default_snap_radius(),
            near_radius: default_near_radius(),
            smoothing: default_smoothing(),
        }
    }
}

impl NcafConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snap_radius <= 0.0 {
            return Err(ConfigError::invalid("aim.ncaf.snap_radius", "must be positive"));
        }
        if self.near_radius < self.snap_radius {
            return Err(ConfigError::invalid(
                "aim.ncaf.near_radius",
                "must not be smaller than snap_radius",
            ));
        }
        if self.smoothing < 1.0 {
            return Err(ConfigError::invalid("aim.ncaf.smoothing", "must be at least 1"));
        }
        Ok(())
    }
}

/// Snap-radius planner.
#[derive(Debug, Default)]
pub struct NcafPlanner {
    acc: StepAccumulator,
}

impl NcafPlanner {
    /// Create a planner with no carried remainder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute this tick's delta.
    pub fn plan(&mut self, input: Option<&AimInput>, cfg: &AimConfig) -> (i32, i32) {
        let Some(input) = input else {
            self.reset();
            return (0, 0);
        };

        let mode = &cfg.ncaf;
        if input.distance > mode.near_radius {
            // Outside both rings this mode applies no correction.
            return (0, 0);
        }

        let scale = cfg.output_scale();
        let (mut fx, mut fy) = (input.error.0 * scale, input.error.1 * scale);

        if input.distance > mode.snap_radius {
            // Ramp the smoothing divisor from 1 at the snap edge to the
            // configured value at the near edge.
            let span = (mode.near_radius - mode.snap_radius).max(f32::EPSILON);
            let t = (input.distance - mode.snap_radius) / span;
            let divisor = 1.0 + t * (mode.smoothing - 1.0);
            fx /= divisor;
            fy /= divisor;
        }

        self.acc.emit(fx, fy, cfg.max_step)
    }

    /// Drop carried state.
    pub fn reset(&mut self) {
        self.acc.reset();
    }
}
