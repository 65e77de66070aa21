//! # Capture Module
//!
//! Live video sources that feed the frame pump.
//!
//! A capture source is acquired when a session starts and released when it
//! ends. Between those points the frame pump polls it once per tick: it asks
//! whether a fresh frame is ready and, if so, takes it. Polling never blocks;
//! sources that produce frames on their own schedule buffer the latest one
//! (see `crate::core::FrameSlot`).

pub mod ffmpeg;
pub mod synthetic;

pub use ffmpeg::{FfmpegCaptureSource, FfmpegInput};
pub use synthetic::SyntheticSource;

use crate::core::Frame;
use crate::error::StreamResult;

/// Abstract interface for live frame sources.
/// Enables pluggable capture backends (devices, files, test patterns).
pub trait CaptureSource: Send {
    /// Acquire the underlying device. Failing here keeps the session from
    /// ever connecting.
    fn acquire(&mut self) -> StreamResult<()>;

    /// Whether a frame that has not been taken yet is available.
    fn frame_ready(&self) -> bool;

    /// Take the current frame. Returns `None` if nothing is ready.
    fn current_frame(&mut self) -> Option<Frame>;

    /// Release the device. Must be safe to call more than once.
    fn release(&mut self);

    /// Human-readable name used in logs and errors.
    fn describe(&self) -> String;
}
