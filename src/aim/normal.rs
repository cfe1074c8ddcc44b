//! Normal Mode
//!
//! Linear interpolation of the remaining offset. Each axis is scaled by
//! its own speed coefficient; inside the smoothing radius the step is
//! additionally divided by the smoothing factor so the final approach
//! settles instead of oscillating across the target.

use serde::{Deserialize, Serialize};

use crate::aim::{AimConfig, AimInput, StepAccumulator};
use crate::config::ConfigError;

/// Normal mode section
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalConfig {
    /// Horizontal speed coefficient
    #[serde(default = "default_speed")]
    pub speed_x: f32,

    /// Vertical speed coefficient
    #[serde(default = "default_speed")]
    pub speed_y: f32,

    /// Smoothing divisor applied inside the smoothing radius
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,

    /// Radius within which smoothing applies, in pixels
    #[serde(default = "default_smooth_radius")]
    pub smooth_radius: f32,
}

fn default_speed() -> f32 {
    0.6
}
fn default_smoothing() -> f32 {
    8.0
}
fn default_smooth_radius() -> f32 {
    60.0
}

impl Default for NormalConfig {
    fn default() -> Self {
        Self {
            speed_x: default_speed(),
            speed_y: default_speed(),
            smoothing: default_smoothing(),
            smooth_radius: default_smooth_radius(),
        }
    }
}

impl NormalConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speed_x < 0.0 || self.speed_y < 0.0 {
            return Err(ConfigError::invalid("aim.normal", "speeds must not be negative"));
        }
        if self.smooth_radius < 0.0 {
            return Err(ConfigError::invalid(
                "aim.normal.smooth_radius",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// Linear interpolation planner.
#[derive(Debug, Default)]
pub struct NormalPlanner {
    acc: StepAccumulator,
}

impl NormalPlanner {
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

        let scale = cfg.output_scale();
        let mode = &cfg.normal;
        let mut fx = input.error.0 * scale * mode.speed_x;
        let mut fy = input.error.1 * scale * mode.speed_y;

        if input.distance < mode.smooth_radius {
            let smoothing = mode.smoothing.max(0.01);
            fx /= smoothing;
            fy /= smoothing;
        }

        self.acc.emit(fx, fy, cfg.max_step)
    }

    /// Drop carried state.
    pub fn reset(&mut self) {
        self.acc.reset();
    }
}
