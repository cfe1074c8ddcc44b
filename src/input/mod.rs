//! Physical Input State
//!
//! Shared view of the physical mouse button state. The embedding
//! integration (device listener, OS hook, hardware box) writes button
//! transitions here; the motion planners and the trigger/recoil state
//! machines only ever read. A single atomic bitmask keeps the tick loop
//! free of locks on its hottest read path.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Mouse button identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
    /// Extra button 1 (side button)
    Extra1,
    /// Extra button 2 (side button)
    Extra2,
}

impl MouseButton {
    /// All buttons, in bit order.
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Extra1,
        MouseButton::Extra2,
    ];

    /// Convert to bitmask index
    pub fn index(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
            MouseButton::Extra1 => 3,
            MouseButton::Extra2 => 4,
        }
    }

    fn bit(self) -> u8 {
        1 << self.index()
    }
}

/// Lock-free snapshot of the five physical mouse buttons.
///
/// Writers call [`ButtonStates::set`] on press/release transitions;
/// readers call [`ButtonStates::is_pressed`]. Torn reads are impossible
/// because the whole state fits one atomic byte.
#[derive(Debug, Default)]
pub struct ButtonStates {
    bits: AtomicU8,
}

impl ButtonStates {
    /// Create a state view with all buttons released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a button transition.
    pub fn set(&self, button: MouseButton, pressed: bool) {
        if pressed {
            self.bits.fetch_or(button.bit(), Ordering::Release);
        } else {
            self.bits.fetch_and(!button.bit(), Ordering::Release);
        }
    }

    /// Check whether a button is currently held.
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.bits.load(Ordering::Acquire) & button.bit() != 0
    }

    /// Buttons currently held, in bit order.
    pub fn pressed(&self) -> Vec<MouseButton> {
        let bits = self.bits.load(Ordering::Acquire);
        MouseButton::ALL
            .into_iter()
            .filter(|b| bits & b.bit() != 0)
            .collect()
    }

    /// Release every button.
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read() {
        let states = ButtonStates::new();
        assert!(!states.is_pressed(MouseButton::Left));

        states.set(MouseButton::Left, true);
        states.set(MouseButton::Extra2, true);

        assert!(states.is_pressed(MouseButton::Left));
        assert!(states.is_pressed(MouseButton::Extra2));
        assert!(!states.is_pressed(MouseButton::Right));
        assert_eq!(
            states.pressed(),
            vec![MouseButton::Left, MouseButton::Extra2]
        );
    }

    #[test]
    fn test_release() {
        let states = ButtonStates::new();
        states.set(MouseButton::Right, true);
        states.set(MouseButton::Right, false);
        assert!(!states.is_pressed(MouseButton::Right));
    }

    #[test]
    fn test_clear() {
        let states = ButtonStates::new();
        for button in MouseButton::ALL {
            states.set(button, true);
        }
        states.clear();
        assert!(states.pressed().is_empty());
    }
}
