//! Command Dispatcher
//!
//! The consumer side of the command queue: a dedicated thread draining
//! in FIFO order and forwarding to the [`MouseBackend`]. Device faults
//! are counted and logged but never stop the thread; reconnection
//! belongs to the external connection-management layer.
//!
//! Shutdown discipline: stale movement is discarded, pending button
//! releases are forwarded, and every button the dispatcher still
//! believes is pressed gets an explicit release before the thread
//! exits. The device is never left in a stuck-pressed state.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::MouseBackend;
use crate::command::{Command, CommandQueue};
use crate::input::MouseButton;

/// How long the drain loop blocks waiting for a command before
/// rechecking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherStats {
    /// Commands forwarded to the backend
    pub forwarded: u64,
    /// Backend faults survived
    pub device_faults: u64,
    /// Stale commands discarded during shutdown
    pub discarded_on_shutdown: u64,
    /// Buttons force-released during shutdown
    pub released_on_shutdown: u64,
}

/// Dispatcher thread handle.
pub struct Dispatcher {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<DispatcherStats>>,
}

impl Dispatcher {
    /// Spawn the drain thread over `queue`, forwarding to `backend`.
    pub fn spawn(
        queue: Arc<CommandQueue>,
        backend: Box<dyn MouseBackend>,
    ) -> std::io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));

        let thread_shutdown = shutdown.clone();
        let thread_stats = stats.clone();
        let handle = std::thread::Builder::new()
            .name("command-dispatcher".into())
            .spawn(move || drain_loop(queue, backend, thread_shutdown, thread_stats))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            stats,
        })
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DispatcherStats {
        *self.stats.lock()
    }

    /// Signal the thread to stop and wait for it to finish its
    /// shutdown drain.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("dispatcher thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drain_loop(
    queue: Arc<CommandQueue>,
    mut backend: Box<dyn MouseBackend>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<DispatcherStats>>,
) {
    debug!("dispatcher started");
    let mut pressed: HashSet<MouseButton> = HashSet::new();

    while !shutdown.load(Ordering::Acquire) {
        match queue.recv_timeout(POLL_INTERVAL) {
            Ok(cmd) => forward(&mut *backend, cmd, &mut pressed, &stats),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Shutdown drain: movement is stale the moment the loop stopped,
    // but releases must still reach the device.
    while let Ok(cmd) = queue.try_recv() {
        match cmd {
            Command::Button(b) if !b.pressed => {
                forward(&mut *backend, Command::Button(b), &mut pressed, &stats);
            }
            _ => stats.lock().discarded_on_shutdown += 1,
        }
    }

    for button in pressed.drain() {
        info!(?button, "releasing held button on shutdown");
        if let Err(e) = backend.set_button(button, false) {
            warn!(?button, error = %e, "failed to release button on shutdown");
        }
        stats.lock().released_on_shutdown += 1;
    }

    debug!("dispatcher stopped");
}

fn forward(
    backend: &mut dyn MouseBackend,
    cmd: Command,
    pressed: &mut HashSet<MouseButton>,
    stats: &Arc<Mutex<DispatcherStats>>,
) {
    let result = match cmd {
        Command::Move(m) => backend.move_rel(m.dx, m.dy),
        Command::Button(b) => {
            if b.pressed {
                pressed.insert(b.button);
            } else {
                pressed.remove(&b.button);
            }
            backend.set_button(b.button, b.pressed)
        }
    };

    match result {
        Ok(()) => stats.lock().forwarded += 1,
        Err(e) => {
            // Device fault: report and keep draining so an external
            // reconnect can pick the stream back up.
            warn!(seq = cmd.seq(), error = %e, "backend rejected command");
            stats.lock().device_faults += 1;
        }
    }
}
