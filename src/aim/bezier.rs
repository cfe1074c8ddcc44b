//! Bezier Mode
//!
//! Moves along a cubic curve toward the target instead of a straight
//! line. Control points are pushed perpendicular to the chord by the
//! configured curvature, the curve is stepped parametrically every tick,
//! and the path is rebuilt when the reported error disagrees with the
//! remaining curve by more than the retarget tolerance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::aim::{AimConfig, AimInput, StepAccumulator};
use crate::config::ConfigError;

/// Bezier mode section
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BezierConfig {
    /// Sideways control-point push as a fraction of the chord length
    #[serde(default = "default_curvature")]
    pub curvature: f32,

    /// Time to traverse the curve, in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Disagreement between the reported error and the remaining curve
    /// that forces a rebuild, in pixels
    #[serde(default = "default_retarget_tolerance")]
    pub retarget_tolerance: f32,
}

fn default_curvature() -> f32 {
    0.3
}
fn default_duration_ms() -> u64 {
    140
}
fn default_retarget_tolerance() -> f32 {
    8.0
}

impl Default for BezierConfig {
    fn default() -> Self {
        Self {
            curvature: default_curvature(),
            duration_ms: default_duration_ms(),
            retarget_tolerance: default_retarget_tolerance(),
        }
    }
}

impl BezierConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_ms == 0 {
            return Err(ConfigError::invalid("aim.bezier.duration_ms", "must be positive"));
        }
        if self.retarget_tolerance < 0.0 {
            return Err(ConfigError::invalid(
                "aim.bezier.retarget_tolerance",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// An in-flight curve in pixel-error space. The origin is wherever the
/// pointer was when the curve was built.
#[derive(Debug, Clone, Copy)]
struct CurvePath {
    ctrl1: (f32, f32),
    ctrl2: (f32, f32),
    goal: (f32, f32),
    /// Curve parameter in [0, 1]
    t: f32,
    /// Curve position already emitted
    emitted: (f32, f32),
}

impl CurvePath {
    fn build(goal: (f32, f32), curvature: f32) -> Self {
        let len = goal.0.hypot(goal.1);
        let perp = if len > 0.0 {
            (-goal.1 / len * curvature * len, goal.0 / len * curvature * len)
        } else {
            (0.0, 0.0)
        };
        Self {
            ctrl1: (goal.0 / 3.0 + perp.0, goal.1 / 3.0 + perp.1),
            ctrl2: (goal.0 * 2.0 / 3.0 + perp.0, goal.1 * 2.0 / 3.0 + perp.1),
            goal,
            t: 0.0,
            emitted: (0.0, 0.0),
        }
    }

    fn point_at(&self, t: f32) -> (f32, f32) {
        let u = 1.0 - t;
        // p0 is the origin, so its term vanishes.
        let b1 = 3.0 * u * u * t;
        let b2 = 3.0 * u * t * t;
        let b3 = t * t * t;
        (
            b1 * self.ctrl1.0 + b2 * self.ctrl2.0 + b3 * self.goal.0,
            b1 * self.ctrl1.1 + b2 * self.ctrl2.1 + b3 * self.goal.1,
        )
    }

    fn remaining(&self) -> (f32, f32) {
        (self.goal.0 - self.emitted.0, self.goal.1 - self.emitted.1)
    }
}

/// Curve planner.
#[derive(Debug, Default)]
pub struct BezierPlanner {
    path: Option<CurvePath>,
    acc: StepAccumulator,
}

impl BezierPlanner {
    /// Create a planner with no path in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute this tick's delta.
    pub fn plan(&mut self, input: Option<&AimInput>, cfg: &AimConfig, dt: Duration) -> (i32, i32) {
        let Some(input) = input else {
            self.reset();
            return (0, 0);
        };

        let mode = &cfg.bezier;
        let mut path = match self.path.take() {
            Some(path) => {
                let rem = path.remaining();
                let dx = input.error.0 - rem.0;
                let dy = input.error.1 - rem.1;
                if dx.hypot(dy) > mode.retarget_tolerance {
                    CurvePath::build(input.error, mode.curvature)
                } else {
                    path
                }
            }
            None => CurvePath::build(input.error, mode.curvature),
        };

        let step = dt.as_secs_f32() / Duration::from_millis(mode.duration_ms).as_secs_f32();
        path.t = (path.t + step).min(1.0);

        let pos = path.point_at(path.t);
        let delta = (pos.0 - path.emitted.0, pos.1 - path.emitted.1);
        path.emitted = pos;
        if path.t < 1.0 {
            self.path = Some(path);
        }

        let scale = cfg.output_scale();
        self.acc.emit(delta.0 * scale, delta.1 * scale, cfg.max_step)
    }

    /// Drop the in-flight curve and carried remainder.
    pub fn reset(&mut self) {
        self.path = None;
        self.acc.reset();
    }
}
