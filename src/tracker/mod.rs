//! Tracker Orchestrator
//!
//! Drives the fixed-rate loop tying the pipeline together. Each tick:
//! pull one frame, detect target and occluder blobs, select, run the
//! active motion planner plus the trigger and recoil machines, and
//! enqueue their outputs. The loop never catches up after an overrun;
//! it skips the sleep and carries on, bounding drift to one period.
//!
//! Two long-lived threads exist in a running [`Pipeline`]: this tick
//! loop (which may block on capture I/O) and the dispatcher draining
//! the command queue. The queue is the only shared-mutable boundary
//! between them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::aim::{AimInput, MotionPlanner};
use crate::backend::MouseBackend;
use crate::capture::{FrameSource, VideoFrame};
use crate::command::CommandQueue;
use crate::config::{ConfigError, ConfigHandle};
use crate::detect;
use crate::dispatch::{Dispatcher, DispatcherStats};
use crate::error::PipelineError;
use crate::input::ButtonStates;
use crate::recoil::RecoilCompensator;
use crate::target::TargetSelector;
use crate::trigger::TriggerBot;

/// Tick-loop configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Tick rate in Hz
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,

    /// Upper bound on blocking for one frame, in milliseconds
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

fn default_tick_rate() -> u32 {
    60
}
fn default_frame_timeout_ms() -> u64 {
    50
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            frame_timeout_ms: default_frame_timeout_ms(),
        }
    }
}

impl PacingConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::invalid("pacing.tick_rate", "must be at least 1"));
        }
        Ok(())
    }

    /// Target tick period.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }
}

/// Tick-loop counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    /// Ticks executed
    pub ticks: u64,
    /// Ticks that overran their period
    pub overruns: u64,
    /// Ticks with no frame available
    pub missed_frames: u64,
    /// Ticks with an active target
    pub targets_seen: u64,
    /// Planner movements enqueued
    pub moves_emitted: u64,
    /// Trigger button commands enqueued
    pub button_commands: u64,
    /// Recoil movements enqueued
    pub recoil_moves: u64,
}

/// The tick-side state of the pipeline: selector history, the active
/// planner, and the two input state machines. Mutated exclusively by
/// the tick loop.
pub struct Tracker {
    config: Arc<ConfigHandle>,
    queue: Arc<CommandQueue>,
    buttons: Arc<ButtonStates>,
    selector: TargetSelector,
    planner: MotionPlanner,
    trigger: TriggerBot,
    recoil: RecoilCompensator,
    stats: TickStats,
    last_tick: Option<Instant>,
}

impl Tracker {
    /// Assemble a tracker over the shared queue and button state.
    pub fn new(
        config: Arc<ConfigHandle>,
        queue: Arc<CommandQueue>,
        buttons: Arc<ButtonStates>,
    ) -> Self {
        let snapshot = config.snapshot();
        Self {
            planner: MotionPlanner::new(&snapshot.aim),
            recoil: RecoilCompensator::new(snapshot.recoil.rng_seed),
            config,
            queue,
            buttons,
            selector: TargetSelector::new(),
            trigger: TriggerBot::new(),
            stats: TickStats::default(),
            last_tick: None,
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Run one tick against the given frame (or its absence).
    ///
    /// `now` is injected so tests can drive the timing state machines
    /// deterministically.
    pub fn tick(&mut self, frame: Option<&VideoFrame>, now: Instant) {
        let cfg = self.config.snapshot();
        let dt = self
            .last_tick
            .map(|prev| now.duration_since(prev))
            .unwrap_or_else(|| cfg.pacing.period());
        self.last_tick = Some(now);
        self.stats.ticks += 1;

        // A mode change swaps the planner wholesale; in-flight aim
        // state does not survive it.
        if cfg.aim.mode != self.planner.mode() {
            debug!(from = %self.planner.mode(), to = %cfg.aim.mode, "switching motion planner");
            self.planner = MotionPlanner::new(&cfg.aim);
        }

        let (target, origin) = match frame {
            Some(frame) => {
                let blobs = detect::detect(frame, &cfg.detection.target_color, &cfg.detection);
                let occluders = detect::detect(frame, &cfg.detection.smoke_color, &cfg.detection);
                let origin = frame.center();
                (
                    self.selector.select(&blobs, &occluders, &cfg.selection, origin),
                    origin,
                )
            }
            None => {
                self.stats.missed_frames += 1;
                (
                    self.selector.select(&[], &[], &cfg.selection, (0.0, 0.0)),
                    (0.0, 0.0),
                )
            }
        };
        if target.is_some() {
            self.stats.targets_seen += 1;
        }

        // Recoil runs first: while it is active it owns the vertical
        // axis and the planner yields it.
        let fire_held = self.buttons.is_pressed(cfg.recoil.fire_button);
        let recoil_delta = self.recoil.tick(fire_held, &cfg.recoil, now, dt);

        let gate_open = cfg
            .aim
            .activation_button
            .map_or(true, |button| self.buttons.is_pressed(button));
        let aim_input = match &target {
            Some(target) if gate_open => Some(AimInput::from_target(
                target,
                origin,
                &cfg.aim,
                cfg.selection.priority,
                self.recoil.is_active(),
            )),
            _ => None,
        };

        let (dx, dy) = self.planner.plan(aim_input.as_ref(), &cfg.aim, dt);
        if (dx, dy) != (0, 0) {
            self.queue.push_move(dx, dy, now);
            self.stats.moves_emitted += 1;
        }

        for action in self.trigger.tick(target.as_ref(), &cfg.trigger, now) {
            self.queue.push_button(action.button, action.pressed, now);
            self.stats.button_commands += 1;
        }

        if let Some((rx, ry)) = recoil_delta {
            if (rx, ry) != (0, 0) {
                self.queue.push_move(rx, ry, now);
                self.stats.recoil_moves += 1;
            }
        }
    }

    /// Run the fixed-rate loop until `shutdown` is raised, then release
    /// any held button state into the queue.
    pub fn run(mut self, mut source: Box<dyn FrameSource>, shutdown: Arc<AtomicBool>) -> TickStats {
        info!("tracker loop started");

        while !shutdown.load(Ordering::Acquire) {
            let cfg = self.config.snapshot();
            let period = cfg.pacing.period();
            let started = Instant::now();

            let frame = source.next_frame(Duration::from_millis(cfg.pacing.frame_timeout_ms));
            self.tick(frame.as_ref(), Instant::now());

            let elapsed = started.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            } else {
                // Overrun: skip the sleep and take the next tick
                // immediately. Never burst to catch up.
                self.stats.overruns += 1;
                debug!(?elapsed, ?period, "tick overran its period");
            }
        }

        self.release_held_buttons();
        info!(ticks = self.stats.ticks, "tracker loop stopped");
        self.stats
    }

    /// Enqueue releases for anything the state machines still hold.
    fn release_held_buttons(&mut self) {
        let cfg = self.config.snapshot();
        if let Some(action) = self.trigger.force_release(&cfg.trigger) {
            self.queue.push_button(action.button, action.pressed, Instant::now());
        }
    }
}

/// A running pipeline: the tracker thread, the dispatcher thread, and
/// the queue between them.
pub struct Pipeline {
    tracker_handle: JoinHandle<TickStats>,
    dispatcher: Dispatcher,
    shutdown: Arc<AtomicBool>,
    queue: Arc<CommandQueue>,
}

impl Pipeline {
    /// Spawn both threads.
    pub fn spawn(
        config: Arc<ConfigHandle>,
        source: Box<dyn FrameSource>,
        backend: Box<dyn MouseBackend>,
        buttons: Arc<ButtonStates>,
    ) -> Result<Self, PipelineError> {
        let queue = Arc::new(CommandQueue::new(config.snapshot().queue.capacity));
        let dispatcher = Dispatcher::spawn(queue.clone(), backend)
            .map_err(|e| PipelineError::Fatal(format!("failed to spawn dispatcher: {e}")))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let tracker = Tracker::new(config, queue.clone(), buttons);
        let tracker_shutdown = shutdown.clone();
        let tracker_handle = std::thread::Builder::new()
            .name("tracker-loop".into())
            .spawn(move || tracker.run(source, tracker_shutdown))
            .map_err(|e| PipelineError::Fatal(format!("failed to spawn tracker: {e}")))?;

        Ok(Self {
            tracker_handle,
            dispatcher,
            shutdown,
            queue,
        })
    }

    /// Dispatcher counter snapshot.
    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    /// Queue counter snapshot.
    pub fn queue_stats(&self) -> crate::command::QueueStats {
        self.queue.stats()
    }

    /// Orderly shutdown: stop ticking, let the tracker flush its
    /// button releases into the queue, then stop the dispatcher, whose
    /// shutdown drain releases anything still pressed.
    pub fn shutdown(mut self) -> TickStats {
        self.shutdown.store(true, Ordering::Release);
        let stats = match self.tracker_handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                warn!("tracker thread panicked");
                TickStats::default()
            }
        };
        self.dispatcher.stop();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aim::AimMode;
    use crate::capture::{SyntheticScene, SyntheticSource};
    use crate::command::Command;
    use crate::config::Config;
    use crate::detect::hsv_to_rgb;
    use crate::input::MouseButton;

    fn handle(mutate: impl FnOnce(&mut Config)) -> Arc<ConfigHandle> {
        let mut config = Config::default();
        mutate(&mut config);
        Arc::new(ConfigHandle::new(config).unwrap())
    }

    fn scene_with_target(offset_x: i32, offset_y: i32, config: &Config) -> SyntheticScene {
        let mut scene = SyntheticScene::new(200, 200);
        let color = hsv_to_rgb(config.detection.target_color.center());
        scene.add_centered_rect(
            (100 + offset_x) as u32,
            (100 + offset_y) as u32,
            8,
            16,
            color,
        );
        scene
    }

    fn drain(queue: &CommandQueue) -> Vec<Command> {
        std::iter::from_fn(|| queue.try_recv().ok()).collect()
    }

    #[test]
    fn test_tick_emits_movement_toward_target() {
        let config = handle(|_| {});
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        let mut tracker = Tracker::new(config.clone(), queue.clone(), buttons);

        let scene = scene_with_target(40, 0, &config.snapshot());
        let frame = SyntheticSource::render(&scene, 0);
        tracker.tick(Some(&frame), Instant::now());

        let commands = drain(&queue);
        assert!(!commands.is_empty(), "no movement enqueued");
        match commands[0] {
            Command::Move(m) => assert!(m.dx > 0, "moved away from target: {m:?}"),
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_scene_emits_nothing() {
        let config = handle(|_| {});
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        let mut tracker = Tracker::new(config, queue.clone(), buttons);

        let frame = SyntheticSource::render(&SyntheticScene::new(200, 200), 0);
        tracker.tick(Some(&frame), Instant::now());
        tracker.tick(None, Instant::now());

        assert!(drain(&queue).is_empty());
        assert_eq!(tracker.stats().missed_frames, 1);
    }

    #[test]
    fn test_mode_swap_rebuilds_planner() {
        let config = handle(|_| {});
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        let mut tracker = Tracker::new(config.clone(), queue, buttons);
        assert_eq!(tracker.planner.mode(), AimMode::Normal);

        let mut next = (*config.snapshot()).clone();
        next.aim.mode = AimMode::Bezier;
        config.swap(next).unwrap();

        tracker.tick(None, Instant::now());
        assert_eq!(tracker.planner.mode(), AimMode::Bezier);
    }

    #[test]
    fn test_recoil_takes_vertical_axis() {
        let config = handle(|c| {
            c.recoil.enabled = true;
            c.recoil.activation_delay_ms = 100;
            c.aim.normal.smoothing = 1.0;
            c.aim.normal.speed_x = 1.0;
            c.aim.normal.speed_y = 1.0;
        });
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        buttons.set(MouseButton::Left, true);
        let mut tracker = Tracker::new(config.clone(), queue.clone(), buttons.clone());

        let scene = scene_with_target(30, 40, &config.snapshot());
        let frame = SyntheticSource::render(&scene, 0);

        let t0 = Instant::now();
        tracker.tick(Some(&frame), t0);
        drain(&queue);

        // 150ms of hold: compensation active.
        tracker.tick(Some(&frame), t0 + Duration::from_millis(150));
        assert!(tracker.recoil.is_active());

        let commands = drain(&queue);
        let moves: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Move(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 2, "expected planner and recoil moves: {commands:?}");
        // Planner move: horizontal only.
        assert!(moves[0].dx > 0);
        assert_eq!(moves[0].dy, 0, "planner kept the vertical axis");
        // Recoil move: downward drift.
        assert_eq!(moves[1].dx, 0);
        assert!(moves[1].dy > 0);
    }

    #[test]
    fn test_activation_gate_blocks_planner() {
        let config = handle(|c| {
            c.aim.activation_button = Some(MouseButton::Extra1);
        });
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        let mut tracker = Tracker::new(config.clone(), queue.clone(), buttons.clone());

        let scene = scene_with_target(40, 0, &config.snapshot());
        let frame = SyntheticSource::render(&scene, 0);

        tracker.tick(Some(&frame), Instant::now());
        assert!(drain(&queue).is_empty(), "gate closed but planner emitted");

        buttons.set(MouseButton::Extra1, true);
        tracker.tick(Some(&frame), Instant::now());
        assert!(!drain(&queue).is_empty(), "gate open but planner silent");
    }

    #[test]
    fn test_release_held_buttons_flushes_trigger() {
        let config = handle(|c| {
            c.trigger.enabled = true;
            c.trigger.radius = 60.0;
            c.trigger.activation_delay_ms = 50;
        });
        let queue = Arc::new(CommandQueue::new(64));
        let buttons = Arc::new(ButtonStates::new());
        let mut tracker = Tracker::new(config.clone(), queue.clone(), buttons);

        let scene = scene_with_target(10, 0, &config.snapshot());
        let frame = SyntheticSource::render(&scene, 0);

        let t0 = Instant::now();
        tracker.tick(Some(&frame), t0);
        tracker.tick(Some(&frame), t0 + Duration::from_millis(80));
        assert!(tracker.trigger.is_holding());
        drain(&queue);

        tracker.release_held_buttons();
        let commands = drain(&queue);
        assert!(
            commands.iter().any(|c| matches!(
                c,
                Command::Button(b) if !b.pressed
            )),
            "no release enqueued: {commands:?}"
        );
    }
}
