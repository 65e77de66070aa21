//! # Frame Types
//!
//! Captured frames travel from the capture adapter to the encoder as
//! reference-counted RGBA8 buffers, so handing a frame over never copies pixels.

use std::sync::Arc;

use frame_scale::plan::Size;

/// A captured RGBA8 frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel rows, `stride` bytes apart.
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row. Equal to `width * 4` for tightly packed frames.
    pub stride: usize,
    /// Monotonic capture sequence number assigned by the source.
    pub sequence: u64,
}

impl Frame {
    /// Wrap a tightly packed RGBA8 buffer.
    ///
    /// Returns `None` when the buffer length does not match `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            data: Arc::new(data),
            width,
            height,
            stride: width as usize * 4,
            sequence,
        })
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.width,
            h: self.height,
        }
    }
}
