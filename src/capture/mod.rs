//! Frame Acquisition
//!
//! The capture boundary of the pipeline. Concrete capture backends
//! (network stream receivers, capture cards, screen grabbers) live
//! outside this crate; they only have to implement [`FrameSource`].
//! Capture may block on I/O, which is why the tick loop runs on its own
//! dedicated thread and never shares a context with the dispatcher.
//!
//! [`SyntheticSource`] is the one in-tree implementation. It renders a
//! flat scene with configurable rectangles and exists for the demo
//! binary, benchmarks, and tests.

pub mod frame;

pub use frame::{PixelFormat, VideoFrame};

use std::time::{Duration, Instant};

/// Supplies timestamped frames on demand.
///
/// Implementations should honor `timeout` as an upper bound on blocking
/// and return `None` when no frame arrived in time. A `None` tick is a
/// transient condition, not an error: the pipeline treats it as "no
/// target" and keeps running.
pub trait FrameSource: Send {
    /// Pull the next frame, waiting at most `timeout`.
    fn next_frame(&mut self, timeout: Duration) -> Option<VideoFrame>;
}

/// A colored axis-aligned rectangle in a synthetic scene.
#[derive(Debug, Clone, Copy)]
pub struct SceneRect {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Fill color as (r, g, b)
    pub color: (u8, u8, u8),
}

impl SceneRect {
    fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Description of a synthetic scene: a flat background with rectangles
/// painted over it in order.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Background color as (r, g, b)
    pub background: (u8, u8, u8),
    /// Rectangles painted over the background, in order
    pub rects: Vec<SceneRect>,
}

impl SyntheticScene {
    /// An empty scene of the given size over a dark gray background.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: (24, 24, 24),
            rects: Vec::new(),
        }
    }

    /// Add a rectangle centered on `(cx, cy)`.
    pub fn add_centered_rect(&mut self, cx: u32, cy: u32, width: u32, height: u32, color: (u8, u8, u8)) {
        self.rects.push(SceneRect {
            x: cx.saturating_sub(width / 2),
            y: cy.saturating_sub(height / 2),
            width,
            height,
            color,
        });
    }
}

/// Frame source rendering a [`SyntheticScene`] on every pull.
///
/// Never blocks; the timeout is ignored. Mutate the scene between pulls
/// to simulate target motion.
pub struct SyntheticSource {
    scene: SyntheticScene,
    next_frame_id: u64,
}

impl SyntheticSource {
    /// Create a source over the given scene.
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            next_frame_id: 0,
        }
    }

    /// Mutable access to the scene for test-driven motion.
    pub fn scene_mut(&mut self) -> &mut SyntheticScene {
        &mut self.scene
    }

    /// Render one frame without consuming a frame id (used by benches).
    pub fn render(scene: &SyntheticScene, frame_id: u64) -> VideoFrame {
        let mut data = vec![0u8; (scene.width * scene.height * 4) as usize];
        for y in 0..scene.height {
            for x in 0..scene.width {
                let (r, g, b) = scene
                    .rects
                    .iter()
                    .rev()
                    .find(|rect| rect.contains(x, y))
                    .map(|rect| rect.color)
                    .unwrap_or(scene.background);
                let offset = ((y * scene.width + x) * 4) as usize;
                data[offset] = b;
                data[offset + 1] = g;
                data[offset + 2] = r;
                data[offset + 3] = 0xFF;
            }
        }
        VideoFrame::new(
            frame_id,
            scene.width,
            scene.height,
            PixelFormat::Bgra8,
            data,
            Instant::now(),
        )
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self, _timeout: Duration) -> Option<VideoFrame> {
        let frame = Self::render(&self.scene, self.next_frame_id);
        self.next_frame_id += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_background() {
        let scene = SyntheticScene::new(8, 8);
        let frame = SyntheticSource::render(&scene, 0);
        assert!(frame.is_complete());
        assert_eq!(frame.rgb_at(3, 3), (24, 24, 24));
    }

    #[test]
    fn test_synthetic_rect_painted() {
        let mut scene = SyntheticScene::new(16, 16);
        scene.add_centered_rect(8, 8, 4, 4, (200, 40, 220));
        let frame = SyntheticSource::render(&scene, 0);
        assert_eq!(frame.rgb_at(8, 8), (200, 40, 220));
        assert_eq!(frame.rgb_at(1, 1), (24, 24, 24));
    }

    #[test]
    fn test_frame_ids_increment() {
        let mut source = SyntheticSource::new(SyntheticScene::new(4, 4));
        let a = source.next_frame(Duration::ZERO).unwrap();
        let b = source.next_frame(Duration::ZERO).unwrap();
        assert_eq!(a.frame_id + 1, b.frame_id);
    }
}
