//! Trigger State Machine
//!
//! Decides when to press and release the fire button based on target
//! proximity and timing: Idle, Arming (debounce against flicker
//! targets), Firing (burst of timed holds), Cooldown (minimum spacing
//! between activations). All transitions take the current `Instant` as
//! a parameter so the machine is deterministic under test.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::ConfigError;
use crate::input::MouseButton;
use crate::target::Target;

/// Trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Button the machine presses
    #[serde(default = "default_button")]
    pub button: MouseButton,

    /// Maximum target distance from the aim origin to arm, in pixels
    #[serde(default = "default_radius")]
    pub radius: f32,

    /// Dwell required before the first shot, in milliseconds
    #[serde(default = "default_activation_delay_ms")]
    pub activation_delay_ms: u64,

    /// How long each shot holds the button, in milliseconds
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Gap between shots within a burst, in milliseconds
    #[serde(default = "default_inter_shot_delay_ms")]
    pub inter_shot_delay_ms: u64,

    /// Shots per activation
    #[serde(default = "default_burst_count")]
    pub burst_count: u32,

    /// Minimum spacing after an activation, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_button() -> MouseButton {
    MouseButton::Left
}
fn default_radius() -> f32 {
    20.0
}
fn default_activation_delay_ms() -> u64 {
    100
}
fn default_hold_ms() -> u64 {
    80
}
fn default_inter_shot_delay_ms() -> u64 {
    60
}
fn default_burst_count() -> u32 {
    1
}
fn default_cooldown_ms() -> u64 {
    250
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            button: default_button(),
            radius: default_radius(),
            activation_delay_ms: default_activation_delay_ms(),
            hold_ms: default_hold_ms(),
            inter_shot_delay_ms: default_inter_shot_delay_ms(),
            burst_count: default_burst_count(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl TriggerConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radius <= 0.0 {
            return Err(ConfigError::invalid("trigger.radius", "must be positive"));
        }
        if self.burst_count == 0 {
            return Err(ConfigError::invalid("trigger.burst_count", "must be at least 1"));
        }
        Ok(())
    }
}

/// Observable machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    /// Waiting for an eligible target
    Idle,
    /// Eligible target seen, debouncing
    Arming,
    /// Burst in progress
    Firing,
    /// Enforcing minimum spacing
    Cooldown,
}

/// A button transition the machine wants dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonAction {
    /// Which button
    pub button: MouseButton,
    /// Press or release
    pub pressed: bool,
}

#[derive(Debug)]
enum State {
    Idle,
    Arming {
        since: Instant,
    },
    Firing {
        shots_fired: u32,
        button_down: bool,
        phase_start: Instant,
    },
    Cooldown {
        since: Instant,
    },
}

/// Trigger state machine.
#[derive(Debug)]
pub struct TriggerBot {
    state: State,
}

impl TriggerBot {
    /// Create an idle machine.
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Current phase, for diagnostics and tests.
    pub fn phase(&self) -> TriggerPhase {
        match self.state {
            State::Idle => TriggerPhase::Idle,
            State::Arming { .. } => TriggerPhase::Arming,
            State::Firing { .. } => TriggerPhase::Firing,
            State::Cooldown { .. } => TriggerPhase::Cooldown,
        }
    }

    /// Whether the machine currently holds the button down.
    pub fn is_holding(&self) -> bool {
        matches!(self.state, State::Firing { button_down: true, .. })
    }

    /// Advance one tick. Returns the button transitions to dispatch, in
    /// order.
    pub fn tick(
        &mut self,
        target: Option<&Target>,
        cfg: &TriggerConfig,
        now: Instant,
    ) -> Vec<ButtonAction> {
        if !cfg.enabled {
            return self.force_release(cfg).into_iter().collect();
        }

        let eligible = target.is_some_and(|t| t.distance <= cfg.radius);
        let mut actions = Vec::new();

        self.state = match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                if eligible {
                    trace!("trigger arming");
                    State::Arming { since: now }
                } else {
                    State::Idle
                }
            }

            State::Arming { since } => {
                if !eligible {
                    State::Idle
                } else if now.duration_since(since)
                    >= Duration::from_millis(cfg.activation_delay_ms)
                {
                    debug!("trigger firing");
                    actions.push(ButtonAction { button: cfg.button, pressed: true });
                    State::Firing {
                        shots_fired: 1,
                        button_down: true,
                        phase_start: now,
                    }
                } else {
                    State::Arming { since }
                }
            }

            State::Firing {
                shots_fired,
                button_down,
                phase_start,
            } => {
                if !eligible {
                    // Losing the target mid-burst releases immediately;
                    // cooldown still enforces the activation spacing.
                    if button_down {
                        actions.push(ButtonAction { button: cfg.button, pressed: false });
                    }
                    State::Cooldown { since: now }
                } else if button_down {
                    if now.duration_since(phase_start) >= Duration::from_millis(cfg.hold_ms) {
                        actions.push(ButtonAction { button: cfg.button, pressed: false });
                        if shots_fired >= cfg.burst_count {
                            State::Cooldown { since: now }
                        } else {
                            State::Firing {
                                shots_fired,
                                button_down: false,
                                phase_start: now,
                            }
                        }
                    } else {
                        State::Firing { shots_fired, button_down, phase_start }
                    }
                } else if now.duration_since(phase_start)
                    >= Duration::from_millis(cfg.inter_shot_delay_ms)
                {
                    actions.push(ButtonAction { button: cfg.button, pressed: true });
                    State::Firing {
                        shots_fired: shots_fired + 1,
                        button_down: true,
                        phase_start: now,
                    }
                } else {
                    State::Firing { shots_fired, button_down, phase_start }
                }
            }

            State::Cooldown { since } => {
                // Cooldown runs out regardless of target state.
                if now.duration_since(since) >= Duration::from_millis(cfg.cooldown_ms) {
                    State::Idle
                } else {
                    State::Cooldown { since }
                }
            }
        };

        actions
    }

    /// Force the machine idle, returning the release needed if the
    /// button is held. Used on shutdown and when the feature is
    /// disabled mid-hold.
    pub fn force_release(&mut self, cfg: &TriggerConfig) -> Option<ButtonAction> {
        let held = self.is_holding();
        self.state = State::Idle;
        held.then_some(ButtonAction { button: cfg.button, pressed: false })
    }
}

impl Default for TriggerBot {
    fn default() -> Self {
        Self::new()
    }
}
