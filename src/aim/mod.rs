//! Motion Planning
//!
//! Given this tick's target (or its absence) and per-mode state, compute
//! the corrective pointer delta. The five algorithms form a closed set
//! behind [`MotionPlanner`], selected by the config snapshot; the
//! planner owns all of its mutable state and is rebuilt on mode change,
//! reset on target loss.
//!
//! Every mode defines explicit idle behavior for the no-target case.
//! A mode never emits an unspecified delta.
//!
//! # Modes
//!
//! | Mode | Behavior |
//! |------|----------|
//! | Normal | Linear interpolation of the remaining offset, per-axis speeds, smoothing inside a radius |
//! | Silent | Full corrective delta held for a delay, then emitted and immediately returned |
//! | NCAF | Snap ring emits the full delta, near ring graduates smoothing, outside is a no-op |
//! | Bezier | Cubic curve toward the target stepped parametrically |
//! | WindMouse | Stochastic wind/gravity perturbation, bounded velocity |

pub mod bezier;
pub mod ncaf;
pub mod normal;
pub mod silent;
pub mod windmouse;

pub use bezier::{BezierConfig, BezierPlanner};
pub use ncaf::{NcafConfig, NcafPlanner};
pub use normal::{NormalConfig, NormalPlanner};
pub use silent::{SilentConfig, SilentPlanner};
pub use windmouse::{WindMouseConfig, WindMousePlanner};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;
use crate::input::MouseButton;
use crate::target::selector::SelectionPriority;
use crate::target::Target;

/// Motion planning mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AimMode {
    /// Linear interpolation with per-axis speed and smoothing
    Normal,
    /// Deferred full correction with return-to-origin
    Silent,
    /// Snap/near/no-op rings
    Ncaf,
    /// Parametric cubic curve
    Bezier,
    /// Stochastic wind/gravity steps
    WindMouse,
}

impl std::fmt::Display for AimMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AimMode::Normal => "normal",
            AimMode::Silent => "silent",
            AimMode::Ncaf => "ncaf",
            AimMode::Bezier => "bezier",
            AimMode::WindMouse => "windmouse",
        };
        f.write_str(name)
    }
}

/// Optional in-game sensitivity model.
///
/// When present, pixel errors are converted to device counts through the
/// cm-per-revolution model: `360 / ((54.54 / sens) * (dpi / 2.54))`
/// counts per pixel of angular error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameUnitsConfig {
    /// In-game sensitivity
    pub in_game_sens: f32,
    /// Mouse DPI
    pub dpi: u32,
}

impl GameUnitsConfig {
    const CM_PER_REV_BASE: f32 = 54.54;

    /// Device counts per pixel of error.
    pub fn counts_factor(&self) -> f32 {
        let cm_per_rev = Self::CM_PER_REV_BASE / self.in_game_sens.max(0.01);
        let counts_per_cm = self.dpi as f32 / 2.54;
        360.0 / (cm_per_rev * counts_per_cm)
    }
}

/// Aim configuration: mode selector, output scaling, and the per-mode
/// sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AimConfig {
    /// Active planning mode
    #[serde(default = "default_mode")]
    pub mode: AimMode,

    /// Direct output scale; 1.0 emits pixel errors as counts unchanged
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,

    /// Horizontal aim-point offset in pixels
    #[serde(default)]
    pub offset_x: f32,

    /// Vertical aim-point offset in pixels
    #[serde(default)]
    pub offset_y: f32,

    /// Per-tick step clamp in counts
    #[serde(default = "default_max_step")]
    pub max_step: f32,

    /// When set, planners emit only while this button is held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_button: Option<MouseButton>,

    /// Under nearest priority, hold the vertical axis while the aim
    /// point is already inside the target's vertical band
    #[serde(default = "default_hold_vertical")]
    pub hold_vertical_in_band: bool,

    /// Seed for the stochastic planner; omit for entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,

    /// Optional in-game sensitivity conversion, multiplied on top of
    /// `sensitivity`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_units: Option<GameUnitsConfig>,

    /// Normal mode section
    #[serde(default)]
    pub normal: NormalConfig,

    /// Silent mode section
    #[serde(default)]
    pub silent: SilentConfig,

    /// NCAF mode section
    #[serde(default)]
    pub ncaf: NcafConfig,

    /// Bezier mode section
    #[serde(default)]
    pub bezier: BezierConfig,

    /// WindMouse mode section
    #[serde(default)]
    pub windmouse: WindMouseConfig,
}

fn default_mode() -> AimMode {
    AimMode::Normal
}
fn default_sensitivity() -> f32 {
    1.0
}
fn default_max_step() -> f32 {
    60.0
}
fn default_hold_vertical() -> bool {
    true
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            sensitivity: default_sensitivity(),
            offset_x: 0.0,
            offset_y: 0.0,
            max_step: default_max_step(),
            activation_button: None,
            hold_vertical_in_band: default_hold_vertical(),
            rng_seed: None,
            game_units: None,
            normal: NormalConfig::default(),
            silent: SilentConfig::default(),
            ncaf: NcafConfig::default(),
            bezier: BezierConfig::default(),
            windmouse: WindMouseConfig::default(),
        }
    }
}

impl AimConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensitivity <= 0.0 {
            return Err(ConfigError::invalid("aim.sensitivity", "must be positive"));
        }
        if self.max_step <= 0.0 {
            return Err(ConfigError::invalid("aim.max_step", "must be positive"));
        }
        if let Some(game) = &self.game_units {
            if game.in_game_sens <= 0.0 || game.dpi == 0 {
                return Err(ConfigError::invalid(
                    "aim.game_units",
                    "sensitivity and dpi must be positive",
                ));
            }
        }
        self.normal.validate()?;
        self.silent.validate()?;
        self.ncaf.validate()?;
        self.bezier.validate()?;
        self.windmouse.validate()
    }

    /// Combined output scale: direct sensitivity times the optional
    /// game-units conversion.
    pub fn output_scale(&self) -> f32 {
        let game = self.game_units.map(|g| g.counts_factor()).unwrap_or(1.0);
        self.sensitivity * game
    }
}

/// The planner's per-tick view of the target: an offset-adjusted error
/// vector and its magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimInput {
    /// Remaining correction in pixels, aim point minus origin
    pub error: (f32, f32),
    /// Error magnitude before any axis suppression, in pixels
    pub distance: f32,
}

impl AimInput {
    /// Build the planner input for one tick.
    ///
    /// Applies the configured aim offsets, suppresses the vertical axis
    /// while recoil compensation owns it, and applies the vertical-band
    /// hold under nearest priority.
    pub fn from_target(
        target: &Target,
        origin: (f32, f32),
        cfg: &AimConfig,
        priority: SelectionPriority,
        recoil_active: bool,
    ) -> Self {
        let aim = (target.position.0 + cfg.offset_x, target.position.1 + cfg.offset_y);
        let mut error = (aim.0 - origin.0, aim.1 - origin.1);
        let distance = error.0.hypot(error.1);

        if recoil_active {
            error.1 = 0.0;
        } else if cfg.hold_vertical_in_band
            && priority == SelectionPriority::Nearest
            && target.band_contains(aim.1)
        {
            error.1 = 0.0;
        }

        Self { error, distance }
    }
}

/// Sub-pixel step accumulator with a per-tick magnitude clamp.
///
/// Fractional per-tick deltas carry over to the next tick instead of
/// being truncated away; the clamp discards overshoot rather than
/// banking it, so a large error can never burst out later.
#[derive(Debug, Default, Clone)]
pub struct StepAccumulator {
    carry: (f32, f32),
}

impl StepAccumulator {
    /// Clamp, add the carried remainder, and split into an integer step
    /// plus a new remainder.
    pub fn emit(&mut self, fx: f32, fy: f32, max_step: f32) -> (i32, i32) {
        let (fx, fy) = clamp_magnitude(fx, fy, max_step);
        let tx = fx + self.carry.0;
        let ty = fy + self.carry.1;
        let dx = tx.trunc();
        let dy = ty.trunc();
        self.carry = (tx - dx, ty - dy);
        (dx as i32, dy as i32)
    }

    /// Drop the carried remainder.
    pub fn reset(&mut self) {
        self.carry = (0.0, 0.0);
    }
}

/// Scale a vector down to `max_len` when it is longer, preserving
/// direction.
pub(crate) fn clamp_magnitude(x: f32, y: f32, max_len: f32) -> (f32, f32) {
    let len = x.hypot(y);
    if len > max_len && len > 0.0 {
        let scale = max_len / len;
        (x * scale, y * scale)
    } else {
        (x, y)
    }
}

/// The closed set of motion planners. One variant per mode, each owning
/// its own state.
#[derive(Debug)]
pub enum MotionPlanner {
    /// Linear interpolation planner
    Normal(NormalPlanner),
    /// Deferred-correction planner
    Silent(SilentPlanner),
    /// Snap-radius planner
    Ncaf(NcafPlanner),
    /// Curve planner
    Bezier(BezierPlanner),
    /// Stochastic planner
    WindMouse(WindMousePlanner),
}

impl MotionPlanner {
    /// Build the planner for the configured mode.
    pub fn new(cfg: &AimConfig) -> Self {
        match cfg.mode {
            AimMode::Normal => Self::Normal(NormalPlanner::new()),
            AimMode::Silent => Self::Silent(SilentPlanner::new()),
            AimMode::Ncaf => Self::Ncaf(NcafPlanner::new()),
            AimMode::Bezier => Self::Bezier(BezierPlanner::new()),
            AimMode::WindMouse => Self::WindMouse(WindMousePlanner::new(cfg.rng_seed)),
        }
    }

    /// The mode this planner implements.
    pub fn mode(&self) -> AimMode {
        match self {
            Self::Normal(_) => AimMode::Normal,
            Self::Silent(_) => AimMode::Silent,
            Self::Ncaf(_) => AimMode::Ncaf,
            Self::Bezier(_) => AimMode::Bezier,
            Self::WindMouse(_) => AimMode::WindMouse,
        }
    }

    /// Compute this tick's delta, mutating mode state.
    pub fn plan(&mut self, input: Option<&AimInput>, cfg: &AimConfig, dt: Duration) -> (i32, i32) {
        match self {
            Self::Normal(p) => p.plan(input, cfg),
            Self::Silent(p) => p.plan(input, cfg, dt),
            Self::Ncaf(p) => p.plan(input, cfg),
            Self::Bezier(p) => p.plan(input, cfg, dt),
            Self::WindMouse(p) => p.plan(input, cfg),
        }
    }

    /// Drop all in-flight state (mode change, target loss handled by
    /// the modes themselves, explicit resets by the orchestrator).
    pub fn reset(&mut self) {
        match self {
            Self::Normal(p) => p.reset(),
            Self::Silent(p) => p.reset(),
            Self::Ncaf(p) => p.reset(),
            Self::Bezier(p) => p.reset(),
            Self::WindMouse(p) => p.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Rect;
    use crate::target::TargetClass;

    fn target_at(x: f32, y: f32) -> Target {
        Target {
            position: (x, y),
            class: TargetClass::Body,
            distance: 0.0,
            bounds: Rect {
                x: x as u32 - 5,
                y: y as u32 - 10,
                width: 10,
                height: 20,
            },
            age: 0,
            band: (y - 10.0, y + 10.0),
        }
    }

    #[test]
    fn test_output_scale_direct() {
        let cfg = AimConfig::default();
        assert_eq!(cfg.output_scale(), 1.0);
    }

    #[test]
    fn test_output_scale_game_units() {
        let mut cfg = AimConfig::default();
        cfg.game_units = Some(GameUnitsConfig {
            in_game_sens: 7.0,
            dpi: 800,
        });
        let scale = cfg.output_scale();
        // 54.54 / 7 cm per revolution at 800 dpi.
        assert!((scale - 0.1466).abs() < 0.01, "scale was {scale}");
    }

    #[test]
    fn test_every_mode_idles_at_zero() {
        for mode in [
            AimMode::Normal,
            AimMode::Silent,
            AimMode::Ncaf,
            AimMode::Bezier,
            AimMode::WindMouse,
        ] {
            let mut cfg = AimConfig::default();
            cfg.mode = mode;
            cfg.rng_seed = Some(7);
            let mut planner = MotionPlanner::new(&cfg);
            for _ in 0..5 {
                let delta = planner.plan(None, &cfg, Duration::from_millis(16));
                assert_eq!(delta, (0, 0), "mode {mode} emitted while idle");
            }
        }
    }

    #[test]
    fn test_input_applies_offsets() {
        let cfg = AimConfig {
            offset_x: 3.0,
            offset_y: -2.0,
            hold_vertical_in_band: false,
            ..AimConfig::default()
        };
        let target = target_at(110.0, 100.0);
        let input = AimInput::from_target(
            &target,
            (100.0, 100.0),
            &cfg,
            SelectionPriority::HeadFirst,
            false,
        );
        assert_eq!(input.error, (13.0, -2.0));
    }

    #[test]
    fn test_recoil_suppresses_vertical() {
        let cfg = AimConfig::default();
        let target = target_at(110.0, 140.0);
        let input = AimInput::from_target(
            &target,
            (100.0, 100.0),
            &cfg,
            SelectionPriority::HeadFirst,
            true,
        );
        assert_eq!(input.error.1, 0.0);
        assert!(input.error.0 > 0.0);
    }

    #[test]
    fn test_vertical_band_hold() {
        let cfg = AimConfig::default();
        // Aim origin already inside the target's vertical extent.
        let target = target_at(140.0, 100.0);
        let input = AimInput::from_target(
            &target,
            (100.0, 102.0),
            &cfg,
            SelectionPriority::Nearest,
            false,
        );
        assert_eq!(input.error.1, 0.0);

        // Head-first priority does not hold the axis.
        let input = AimInput::from_target(
            &target,
            (100.0, 102.0),
            &cfg,
            SelectionPriority::HeadFirst,
            false,
        );
        assert!(input.error.1 != 0.0);
    }

    #[test]
    fn test_accumulator_carries_subpixels() {
        let mut acc = StepAccumulator::default();
        let mut total = 0;
        for _ in 0..10 {
            let (dx, _) = acc.emit(0.3, 0.0, 100.0);
            total += dx;
        }
        assert_eq!(total, 3);
    }

    #[test]
    fn test_accumulator_clamps_step() {
        let mut acc = StepAccumulator::default();
        let (dx, dy) = acc.emit(300.0, 400.0, 50.0);
        let len = ((dx * dx + dy * dy) as f32).sqrt();
        assert!(len <= 51.0, "step length {len} exceeds clamp");
        // Overshoot is discarded, not banked.
        let (dx2, dy2) = acc.emit(0.0, 0.0, 50.0);
        assert_eq!((dx2, dy2), (0, 0));
    }

    #[test]
    fn test_mode_round_trip() {
        for mode in [
            AimMode::Normal,
            AimMode::Silent,
            AimMode::Ncaf,
            AimMode::Bezier,
            AimMode::WindMouse,
        ] {
            let mut cfg = AimConfig::default();
            cfg.mode = mode;
            assert_eq!(MotionPlanner::new(&cfg).mode(), mode);
        }
    }
}
