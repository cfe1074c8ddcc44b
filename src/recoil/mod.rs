//! Recoil Compensation
//!
//! Two-state machine: Inactive until the fire button has been held past
//! the activation delay (or was re-pressed within the rapid re-click
//! window), Active while the hold lasts. Active ticks emit a downward
//! drift scaled by the pull speed, with optional bounded horizontal
//! jitter. Release drops all accumulated state immediately; hold
//! sessions never carry into each other.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::ConfigError;
use crate::input::MouseButton;

/// Recoil compensation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoilConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Button whose hold drives compensation
    #[serde(default = "default_fire_button")]
    pub fire_button: MouseButton,

    /// Downward drift in counts per second while active
    #[serde(default = "default_pull_speed")]
    pub pull_speed: f32,

    /// Hold time before compensation starts, in milliseconds
    #[serde(default = "default_activation_delay_ms")]
    pub activation_delay_ms: u64,

    /// Press-to-press gap that re-activates without the delay, in
    /// milliseconds
    #[serde(default = "default_rapid_click_ms")]
    pub rapid_click_ms: u64,

    /// Half-range of per-tick horizontal jitter in counts; zero
    /// disables
    #[serde(default)]
    pub horizontal_jitter: f32,

    /// Seed for the jitter source; omit for entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

fn default_fire_button() -> MouseButton {
    MouseButton::Left
}
fn default_pull_speed() -> f32 {
    240.0
}
fn default_activation_delay_ms() -> u64 {
    120
}
fn default_rapid_click_ms() -> u64 {
    180
}

impl Default for RecoilConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fire_button: default_fire_button(),
            pull_speed: default_pull_speed(),
            activation_delay_ms: default_activation_delay_ms(),
            rapid_click_ms: default_rapid_click_ms(),
            horizontal_jitter: 0.0,
            rng_seed: None,
        }
    }
}

impl RecoilConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pull_speed < 0.0 {
            return Err(ConfigError::invalid("recoil.pull_speed", "must not be negative"));
        }
        if self.horizontal_jitter < 0.0 {
            return Err(ConfigError::invalid(
                "recoil.horizontal_jitter",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// Recoil compensation state machine.
#[derive(Debug)]
pub struct RecoilCompensator {
    hold_started: Option<Instant>,
    last_release: Option<Instant>,
    active: bool,
    carry: (f32, f32),
    rng: StdRng,
}

impl RecoilCompensator {
    /// Create an inactive compensator.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            hold_started: None,
            last_release: None,
            active: false,
            carry: (0.0, 0.0),
            rng,
        }
    }

    /// Whether compensation is currently emitting.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Advance one tick. Returns the compensating delta when active.
    pub fn tick(
        &mut self,
        fire_held: bool,
        cfg: &RecoilConfig,
        now: Instant,
        dt: Duration,
    ) -> Option<(i32, i32)> {
        if !cfg.enabled {
            self.deactivate(None);
            return None;
        }

        if !fire_held {
            // Record the release edge for rapid re-click detection.
            let release_at = self.hold_started.is_some().then_some(now);
            self.deactivate(release_at);
            return None;
        }

        let hold_started = match self.hold_started {
            Some(started) => started,
            None => {
                self.hold_started = Some(now);
                let rapid = self.last_release.is_some_and(|rel| {
                    now.duration_since(rel) <= Duration::from_millis(cfg.rapid_click_ms)
                });
                if rapid {
                    debug!("recoil compensation active (rapid re-click)");
                    self.active = true;
                }
                now
            }
        };

        if !self.active
            && now.duration_since(hold_started) >= Duration::from_millis(cfg.activation_delay_ms)
        {
            debug!("recoil compensation active");
            self.active = true;
        }

        if !self.active {
            return None;
        }

        let mut fx = 0.0;
        if cfg.horizontal_jitter > 0.0 {
            fx = self.rng.gen_range(-cfg.horizontal_jitter..=cfg.horizontal_jitter);
        }
        let fy = cfg.pull_speed * dt.as_secs_f32();

        let tx = fx + self.carry.0;
        let ty = fy + self.carry.1;
        let dx = tx.trunc();
        let dy = ty.trunc();
        self.carry = (tx - dx, ty - dy);
        Some((dx as i32, dy as i32))
    }

    fn deactivate(&mut self, released_at: Option<Instant>) {
        if let Some(at) = released_at {
            self.last_release = Some(at);
        }
        self.hold_started = None;
        self.active = false;
        self.carry = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_cfg() -> RecoilConfig {
        RecoilConfig {
            enabled: true,
            pull_speed: 240.0,
            activation_delay_ms: 120,
            rapid_click_ms: 180,
            rng_seed: Some(3),
            ..RecoilConfig::default()
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_no_commands_while_released() {
        let cfg = enabled_cfg();
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();
        for step in 0..20 {
            assert_eq!(rcs.tick(false, &cfg, t0 + ms(10 * step), TICK), None);
        }
        assert!(!rcs.is_active());
    }

    #[test]
    fn test_activates_after_delay_and_pulls_down() {
        let cfg = enabled_cfg();
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();

        assert_eq!(rcs.tick(true, &cfg, t0, TICK), None);
        assert_eq!(rcs.tick(true, &cfg, t0 + ms(60), TICK), None);

        // 120ms held: active, drifting down.
        let delta = rcs.tick(true, &cfg, t0 + ms(120), TICK).unwrap();
        assert!(rcs.is_active());
        assert!(delta.1 > 0, "drift must be downward, got {delta:?}");
        assert_eq!(delta.0, 0, "no jitter configured");
    }

    #[test]
    fn test_release_resets_immediately() {
        let cfg = enabled_cfg();
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();

        rcs.tick(true, &cfg, t0, TICK);
        rcs.tick(true, &cfg, t0 + ms(150), TICK);
        assert!(rcs.is_active());

        assert_eq!(rcs.tick(false, &cfg, t0 + ms(160), TICK), None);
        assert!(!rcs.is_active());

        // A slow re-press starts over from the activation delay.
        assert_eq!(rcs.tick(true, &cfg, t0 + ms(600), TICK), None);
    }

    #[test]
    fn test_rapid_reclick_skips_delay() {
        let cfg = enabled_cfg();
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();

        // First session activates normally, then releases.
        rcs.tick(true, &cfg, t0, TICK);
        rcs.tick(true, &cfg, t0 + ms(130), TICK);
        rcs.tick(false, &cfg, t0 + ms(140), TICK);

        // Re-press 100ms later, inside the rapid window: instant.
        let delta = rcs.tick(true, &cfg, t0 + ms(240), TICK);
        assert!(rcs.is_active());
        assert!(delta.is_some());
    }

    #[test]
    fn test_pull_rate_matches_config() {
        let cfg = enabled_cfg();
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();

        rcs.tick(true, &cfg, t0, TICK);
        let mut total = 0;
        // 100 active ticks of 10ms: one second of drift.
        for step in 0..100 {
            if let Some((_, dy)) = rcs.tick(true, &cfg, t0 + ms(130 + step * 10), TICK) {
                total += dy;
            }
        }
        assert!((total - 240).abs() <= 3, "drifted {total} counts in 1s");
    }

    #[test]
    fn test_jitter_bounded() {
        let mut cfg = enabled_cfg();
        cfg.horizontal_jitter = 2.0;
        let mut rcs = RecoilCompensator::new(cfg.rng_seed);
        let t0 = Instant::now();

        rcs.tick(true, &cfg, t0, TICK);
        for step in 0..50 {
            if let Some((dx, _)) = rcs.tick(true, &cfg, t0 + ms(130 + step * 10), TICK) {
                assert!(dx.abs() <= 3, "jitter {dx} out of bounds");
            }
        }
    }

    #[test]
    fn test_disabled_emits_nothing() {
        let cfg = RecoilConfig::default();
        let mut rcs = RecoilCompensator::new(Some(1));
        assert_eq!(rcs.tick(true, &cfg, Instant::now(), TICK), None);
    }
}
