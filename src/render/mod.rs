//! # Render Module
//!
//! Destinations for annotated frames coming back from the service.
//!
//! A surface is resized to each frame's intrinsic dimensions before it is
//! drawn, so the service decides the output geometry. Surfaces also carry a
//! small FPS label and a placeholder state shown while no session is live.
//!
//! | Surface | Description |
//! |---------|-------------|
//! | `MemorySurface` | Keeps the latest frame in memory (shared handle) |
//! | `FileSurface` | Writes the latest frame to disk atomically |

pub mod file;
pub mod memory;

pub use file::FileSurface;
pub use memory::{MemorySurface, SurfaceSnapshot};

use image::RgbaImage;

use crate::error::StreamResult;

/// Where annotated frames are shown.
pub trait RenderSurface: Send {
    /// Set the drawable area to exactly `width` x `height`.
    fn resize(&mut self, width: u32, height: u32);

    /// Current drawable area, `None` before the first resize.
    fn size(&self) -> Option<(u32, u32)>;

    /// Replace the surface content with `image`.
    fn draw(&mut self, image: &RgbaImage) -> StreamResult<()>;

    /// Update the FPS label. `None` clears it.
    fn show_fps(&mut self, fps: Option<f64>);

    /// Return to the idle look shown when nothing is streaming.
    fn show_placeholder(&mut self);
}

/// Text for the FPS label.
pub fn fps_label(fps: Option<f64>) -> String {
    match fps {
        Some(fps) if fps.is_finite() => format!("{fps:.1} FPS"),
        _ => "-- FPS".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_label() {
        assert_eq!(fps_label(Some(9.96)), "10.0 FPS");
        assert_eq!(fps_label(Some(0.0)), "0.0 FPS");
        assert_eq!(fps_label(None), "-- FPS");
        assert_eq!(fps_label(Some(f64::INFINITY)), "-- FPS");
    }
}
