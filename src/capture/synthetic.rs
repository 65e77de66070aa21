//! # Synthetic Capture Source
//!
//! Moving gradient test pattern. Useful for exercising the whole pipeline
//! against a real service when no camera is attached.

use tracing::debug;

use crate::capture::CaptureSource;
use crate::core::Frame;
use crate::error::{StreamError, StreamResult};

/// Test-pattern source that has a new frame ready on every poll.
#[derive(Debug)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    sequence: u64,
    acquired: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: 0,
            acquired: false,
        }
    }

    fn render_pattern(&self) -> Vec<u8> {
        let (width, height) = (self.width, self.height);
        let shift = (self.sequence % width.max(1) as u64) as u32;
        let mut data = vec![0u8; (width * height * 4) as usize];

        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                let r = (((x + shift) % width) * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                data[idx] = r;
                data[idx + 1] = g;
                data[idx + 2] = 128;
                data[idx + 3] = 255;
            }
        }
        data
    }
}

impl CaptureSource for SyntheticSource {
    fn acquire(&mut self) -> StreamResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::acquisition(
                self.describe(),
                "pattern dimensions must be non-zero",
            ));
        }
        self.acquired = true;
        debug!("Synthetic source acquired ({}x{})", self.width, self.height);
        Ok(())
    }

    fn frame_ready(&self) -> bool {
        self.acquired
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if !self.acquired {
            return None;
        }
        let data = self.render_pattern();
        let frame = Frame::from_rgba(self.width, self.height, data, self.sequence);
        self.sequence += 1;
        frame
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn describe(&self) -> String {
        format!("synthetic:{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_until_acquired() {
        let mut source = SyntheticSource::new(8, 4);
        assert!(!source.frame_ready());
        assert!(source.current_frame().is_none());

        source.acquire().unwrap();
        assert!(source.frame_ready());
        let frame = source.current_frame().unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.data.len(), 8 * 4 * 4);

        source.release();
        source.release();
        assert!(!source.frame_ready());
    }

    #[test]
    fn test_zero_sized_pattern_fails_acquisition() {
        let mut source = SyntheticSource::new(0, 4);
        let err = source.acquire().unwrap_err();
        assert_eq!(err.category(), "acquisition");
    }

    #[test]
    fn test_sequence_advances_per_frame() {
        let mut source = SyntheticSource::new(4, 4);
        source.acquire().unwrap();
        let a = source.current_frame().unwrap();
        let b = source.current_frame().unwrap();
        assert_eq!((a.sequence, b.sequence), (0, 1));
    }
}
