//! In-memory render surface.
//!
//! Clones share state, so a caller can keep one handle for inspection while
//! the session owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbaImage;

use crate::error::{StreamError, StreamResult};
use crate::render::{RenderSurface, fps_label};

/// What the surface currently shows.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    pub size: Option<(u32, u32)>,
    pub frame: Option<RgbaImage>,
    pub fps_label: Option<String>,
    pub draws: u64,
    pub resizes: u64,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    inner: Arc<Mutex<SurfaceSnapshot>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceSnapshot> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl RenderSurface for MemorySurface {
    fn resize(&mut self, width: u32, height: u32) {
        let mut state = self.lock();
        state.size = Some((width, height));
        state.resizes += 1;
    }

    fn size(&self) -> Option<(u32, u32)> {
        self.lock().size
    }

    fn draw(&mut self, image: &RgbaImage) -> StreamResult<()> {
        let mut state = self.lock();
        if state.size != Some(image.dimensions()) {
            return Err(StreamError::state(
                format!("{:?}", state.size),
                "draw",
                format!("frame is {:?}", image.dimensions()),
            ));
        }
        state.frame = Some(image.clone());
        state.draws += 1;
        state.placeholder = false;
        Ok(())
    }

    fn show_fps(&mut self, fps: Option<f64>) {
        self.lock().fps_label = fps.map(|fps| fps_label(Some(fps)));
    }

    fn show_placeholder(&mut self) {
        let mut state = self.lock();
        state.frame = None;
        state.fps_label = None;
        state.placeholder = true;
    }
}
