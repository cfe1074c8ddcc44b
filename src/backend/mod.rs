//! Output Device Abstraction
//!
//! The dispatcher talks to pointer hardware through [`MouseBackend`]
//! only. Concrete backends (serial converters, network input boxes,
//! OS-native injection) live outside this crate with their own wire
//! protocols and connection management; reconnection is their problem,
//! the dispatcher just reports faults and keeps going.

use thiserror::Error;
use tracing::trace;

use crate::input::MouseButton;

/// Backend fault. A fault never stops the dispatcher; it is reported
/// and the next command is attempted.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The device is not connected
    #[error("device disconnected")]
    Disconnected,

    /// The device rejected or failed a write
    #[error("device write failed: {0}")]
    Write(String),
}

/// Abstract pointer device.
#[cfg_attr(test, mockall::automock)]
pub trait MouseBackend: Send {
    /// Apply a relative movement.
    fn move_rel(&mut self, dx: i32, dy: i32) -> Result<(), BackendError>;

    /// Press or release a button.
    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), BackendError>;

    /// Whether the device currently accepts commands.
    fn is_connected(&self) -> bool;
}

/// Backend that discards all commands. Used by the demo binary and as a
/// stand-in when no device is attached.
#[derive(Debug, Default)]
pub struct NullBackend {
    moves: u64,
    button_events: u64,
}

impl NullBackend {
    /// Create a backend that swallows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Movements received.
    pub fn moves(&self) -> u64 {
        self.moves
    }

    /// Button transitions received.
    pub fn button_events(&self) -> u64 {
        self.button_events
    }
}

impl MouseBackend for NullBackend {
    fn move_rel(&mut self, dx: i32, dy: i32) -> Result<(), BackendError> {
        self.moves += 1;
        trace!(dx, dy, "null backend move");
        Ok(())
    }

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), BackendError> {
        self.button_events += 1;
        trace!(?button, pressed, "null backend button");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// An event observed by [`RecordingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// A relative movement
    Move(i32, i32),
    /// A button transition
    Button(MouseButton, bool),
}

/// Backend that records every command into a shared log. Test and
/// integration tooling.
pub struct RecordingBackend {
    events: std::sync::Arc<parking_lot::Mutex<Vec<BackendEvent>>>,
}

impl RecordingBackend {
    /// Create a recorder and the shared log it writes to.
    pub fn new() -> (Self, std::sync::Arc<parking_lot::Mutex<Vec<BackendEvent>>>) {
        let events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        (Self { events: events.clone() }, events)
    }
}

impl MouseBackend for RecordingBackend {
    fn move_rel(&mut self, dx: i32, dy: i32) -> Result<(), BackendError> {
        self.events.lock().push(BackendEvent::Move(dx, dy));
        Ok(())
    }

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<(), BackendError> {
        self.events.lock().push(BackendEvent::Button(button, pressed));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}
