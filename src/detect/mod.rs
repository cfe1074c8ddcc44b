//! Color Target Detection
//!
//! Converts a frame into candidate blobs matching a configured HSV
//! range. Stateless: every tick recomputes from the current frame only.
//!
//! Key pieces:
//! - [`color`]: RGB/HSV conversion and the [`color::HsvRange`]
//!   classification primitive
//! - [`blob`]: the [`blob::Blob`] region type and its bounding
//!   rectangle math
//! - [`detector`]: mask segmentation and connected-region extraction

pub mod blob;
pub mod color;
pub mod detector;

pub use blob::{Blob, Rect};
pub use color::{hsv_to_rgb, rgb_to_hsv, Hsv, HsvRange};
pub use detector::{detect, write_mask_png, DetectionConfig};
