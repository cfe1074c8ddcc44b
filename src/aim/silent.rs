//! Silent Mode
//!
//! Computes the full corrective delta immediately but defers emission:
//! the correction is held for a configured delay, fired in a single
//! tick, and followed by the inverse delta on the next tick. Visible
//! aim motion is decoupled from the moment of correction; the pointer
//! ends each cycle where it started.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::aim::{clamp_magnitude, AimConfig, AimInput};
use crate::config::ConfigError;

/// Silent mode section
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SilentConfig {
    /// How long a correction is held before it fires, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    40
}

impl Default for SilentConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

impl SilentConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Holding { held: Duration },
    Returning { back: (i32, i32) },
}

/// Deferred-correction planner.
#[derive(Debug)]
pub struct SilentPlanner {
    phase: Phase,
}

impl SilentPlanner {
    /// Create an idle planner.
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Compute this tick's delta.
    ///
    /// The return leg always completes, target or not: a fired
    /// correction that never returns would leave the pointer displaced.
    pub fn plan(&mut self, input: Option<&AimInput>, cfg: &AimConfig, dt: Duration) -> (i32, i32) {
        if let Phase::Returning { back } = self.phase {
            self.phase = Phase::Idle;
            return back;
        }

        let Some(input) = input else {
            self.phase = Phase::Idle;
            return (0, 0);
        };

        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Holding { held: Duration::ZERO };
                (0, 0)
            }
            Phase::Holding { held } => {
                let held = held + dt;
                if held < Duration::from_millis(cfg.silent.delay_ms) {
                    self.phase = Phase::Holding { held };
                    return (0, 0);
                }

                let scale = cfg.output_scale();
                let (fx, fy) = clamp_magnitude(
                    input.error.0 * scale,
                    input.error.1 * scale,
                    cfg.max_step,
                );
                let delta = (fx.round() as i32, fy.round() as i32);
                self.phase = Phase::Returning {
                    back: (-delta.0, -delta.1),
                };
                delta
            }
            Phase::Returning { .. } => unreachable!("handled above"),
        }
    }

    /// Drop any held or pending correction.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

impl Default for SilentPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(ex: f32, ey: f32) -> AimInput {
        AimInput {
            error: (ex, ey),
            distance: ex.hypot(ey),
        }
    }

    fn cfg_with_delay(delay_ms: u64) -> AimConfig {
        let mut cfg = AimConfig::default();
        cfg.silent.delay_ms = delay_ms;
        cfg
    }

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_holds_then_fires_then_returns() {
        let cfg = cfg_with_delay(25);
        let mut planner = SilentPlanner::new();
        let target = input(30.0, -12.0);

        // Acquisition tick plus two held ticks (10ms, 20ms elapsed).
        assert_eq!(planner.plan(Some(&target), &cfg, TICK), (0, 0));
        assert_eq!(planner.plan(Some(&target), &cfg, TICK), (0, 0));
        assert_eq!(planner.plan(Some(&target), &cfg, TICK), (0, 0));

        // 30ms held: fires the full correction.
        let fired = planner.plan(Some(&target), &cfg, TICK);
        assert_eq!(fired, (30, -12));

        // Next tick returns to origin.
        let back = planner.plan(Some(&target), &cfg, TICK);
        assert_eq!(back, (-30, 12));
    }

    #[test]
    fn test_return_leg_survives_target_loss() {
        let cfg = cfg_with_delay(0);
        let mut planner = SilentPlanner::new();
        let target = input(20.0, 0.0);

        assert_eq!(planner.plan(Some(&target), &cfg, TICK), (0, 0));
        assert_eq!(planner.plan(Some(&target), &cfg, TICK), (20, 0));
        // Target vanished mid-cycle; the return still fires.
        assert_eq!(planner.plan(None, &cfg, TICK), (-20, 0));
        assert_eq!(planner.plan(None, &cfg, TICK), (0, 0));
    }

    #[test]
    fn test_loss_while_holding_discards() {
        let cfg = cfg_with_delay(100);
        let mut planner = SilentPlanner::new();

        assert_eq!(planner.plan(Some(&input(50.0, 0.0)), &cfg, TICK), (0, 0));
        assert_eq!(planner.plan(None, &cfg, TICK), (0, 0));
        // Fresh target restarts the hold from zero.
        assert_eq!(planner.plan(Some(&input(50.0, 0.0)), &cfg, TICK), (0, 0));
    }

    #[test]
    fn test_fired_delta_clamped() {
        let mut cfg = cfg_with_delay(0);
        cfg.max_step = 25.0;
        let mut planner = SilentPlanner::new();
        let target = input(300.0, 0.0);

        planner.plan(Some(&target), &cfg, TICK);
        let fired = planner.plan(Some(&target), &cfg, TICK);
        assert_eq!(fired, (25, 0));
    }
}
