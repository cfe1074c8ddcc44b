//! WindMouse Mode
//!
//! Stochastic motion model: a random-walk wind force perturbs the step
//! while a gravity term pulls toward the target, so repeated corrections
//! to the same target never replay the same path. Velocity is bounded
//! and the wind collapses near the target so the approach converges
//! instead of orbiting.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::aim::{AimConfig, AimInput, StepAccumulator};
use crate::config::ConfigError;

/// WindMouse mode section
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindMouseConfig {
    /// Pull toward the target per tick
    #[serde(default = "default_gravity")]
    pub gravity: f32,

    /// Magnitude of the random wind force
    #[serde(default = "default_wind")]
    pub wind: f32,

    /// Velocity bound in pixels per tick
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f32,

    /// Radius within which wind damps and velocity shrinks, in pixels
    #[serde(default = "default_damp_radius")]
    pub damp_radius: f32,
}

fn default_gravity() -> f32 {
    9.0
}
fn default_wind() -> f32 {
    3.0
}
fn default_max_velocity() -> f32 {
    15.0
}
fn default_damp_radius() -> f32 {
    12.0
}

impl Default for WindMouseConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            wind: default_wind(),
            max_velocity: default_max_velocity(),
            damp_radius: default_damp_radius(),
        }
    }
}

impl WindMouseConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_velocity <= 0.0 {
            return Err(ConfigError::invalid(
                "aim.windmouse.max_velocity",
                "must be positive",
            ));
        }
        if self.damp_radius <= 0.0 {
            return Err(ConfigError::invalid(
                "aim.windmouse.damp_radius",
                "must be positive",
            ));
        }
        if self.gravity < 0.0 || self.wind < 0.0 {
            return Err(ConfigError::invalid(
                "aim.windmouse",
                "gravity and wind must not be negative",
            ));
        }
        Ok(())
    }
}

const SQRT_3: f32 = 1.732_050_8;
const SQRT_5: f32 = 2.236_068;

/// Stochastic planner.
#[derive(Debug)]
pub struct WindMousePlanner {
    velocity: (f32, f32),
    wind: (f32, f32),
    rng: StdRng,
    acc: StepAccumulator,
}

impl WindMousePlanner {
    /// Create a planner. A fixed seed makes the path deterministic for
    /// tests; `None` seeds from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            velocity: (0.0, 0.0),
            wind: (0.0, 0.0),
            rng,
            acc: StepAccumulator::default(),
        }
    }

    /// Compute this tick's delta.
    pub fn plan(&mut self, input: Option<&AimInput>, cfg: &AimConfig) -> (i32, i32) {
        let Some(input) = input else {
            self.reset();
            return (0, 0);
        };

        let mode = &cfg.windmouse;
        let dist = input.distance;
        if dist < 0.5 {
            self.velocity = (0.0, 0.0);
            self.wind = (0.0, 0.0);
            return (0, 0);
        }

        if dist >= mode.damp_radius {
            let wind_mag = mode.wind.min(dist);
            self.wind.0 =
                self.wind.0 / SQRT_3 + (self.rng.gen::<f32>() * 2.0 - 1.0) * wind_mag / SQRT_5;
            self.wind.1 =
                self.wind.1 / SQRT_3 + (self.rng.gen::<f32>() * 2.0 - 1.0) * wind_mag / SQRT_5;
        } else {
            // Close in: let the wind die off so the approach settles.
            self.wind.0 /= SQRT_3;
            self.wind.1 /= SQRT_3;
        }

        self.velocity.0 += self.wind.0 + mode.gravity * input.error.0 / dist;
        self.velocity.1 += self.wind.1 + mode.gravity * input.error.1 / dist;

        let limit = if dist < mode.damp_radius {
            (mode.max_velocity * dist / mode.damp_radius).max(1.0)
        } else {
            mode.max_velocity
        };
        let speed = self.velocity.0.hypot(self.velocity.1);
        if speed > limit {
            let scale = limit / speed;
            self.velocity.0 *= scale;
            self.velocity.1 *= scale;
        }

        let scale = cfg.output_scale();
        self.acc
            .emit(self.velocity.0 * scale, self.velocity.1 * scale, cfg.max_step)
    }

    /// Drop velocity, wind, and carried remainder.
    pub fn reset(&mut self) {
        self.velocity = (0.0, 0.0);
        self.wind = (0.0, 0.0);
        self.acc.reset();
    }
}
