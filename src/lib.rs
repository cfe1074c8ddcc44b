//! # chromatrack
//!
//! Real-time color-target tracking pipeline: video frames in,
//! corrective pointer-movement and button commands out. A detected
//! color signature is kept centered by per-tick movement corrections,
//! with optional trigger activation inside a tolerance radius and
//! compensation for a periodic vertical deflection pattern.
//!
//! # Architecture
//!
//! ```text
//! chromatrack
//!   ├─> FrameSource (capture boundary, external implementations)
//!   ├─> Detector (HSV segmentation -> blobs)
//!   ├─> TargetSelector (FOV gate, head/body bands, occlusion filter)
//!   ├─> MotionPlanner (Normal | Silent | NCAF | Bezier | WindMouse)
//!   ├─> TriggerBot + RecoilCompensator (timing state machines)
//!   ├─> CommandQueue (bounded, drop-oldest)
//!   └─> Dispatcher -> MouseBackend (device boundary, external impls)
//! ```
//!
//! # Data Flow
//!
//! One direction per tick: Frame -> Blobs -> Target -> Commands ->
//! Device effects. The tick loop and the dispatcher are the only two
//! long-lived threads; the command queue is the only shared-mutable
//! boundary between them.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Motion planning modes and per-mode state
pub mod aim;

/// Output device abstraction
pub mod backend;

/// Frame acquisition boundary
pub mod capture;

/// Movement/button commands and the bounded queue
pub mod command;

/// Configuration loading, validation, and atomic swapping
pub mod config;

/// HSV blob detection
pub mod detect;

/// Command dispatch to the output device
pub mod dispatch;

/// Fault taxonomy
pub mod error;

/// Physical input state shared with the embedding integration
pub mod input;

/// Recoil compensation state machine
pub mod recoil;

/// Target selection and occlusion filtering
pub mod target;

/// The orchestrating tick loop and pipeline lifecycle
pub mod tracker;

/// Trigger state machine
pub mod trigger;

pub use config::{Config, ConfigHandle};
pub use error::PipelineError;
pub use tracker::{Pipeline, Tracker};
