//! # Latest-Frame Slot
//!
//! Single-slot, latest-wins handoff between a capture thread (producer) and
//! the frame pump (consumer).
//!
//! ```text
//! ┌─────────────────┐  publish   ┌─────────────┐  take_fresh  ┌─────────────┐
//! │ Capture thread  │───────────▶│  FrameSlot  │─────────────▶│ Frame pump  │
//! │   (producer)    │ overwrites │  (1 frame)  │   consumes   │ (consumer)  │
//! └─────────────────┘            └─────────────┘              └─────────────┘
//! ```
//!
//! The pump runs at whatever rate the service answers. An unread frame is
//! simply replaced by the next one.

use std::sync::Mutex;

use crate::core::frame::Frame;

/// Latest-wins single-frame buffer shared between threads.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any frame that was never taken.
    pub fn publish(&self, frame: Frame) {
        let mut latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        *latest = Some(frame);
    }

    /// True when a frame is waiting to be taken.
    pub fn has_fresh(&self) -> bool {
        self.latest
            .lock()
            .map(|latest| latest.is_some())
            .unwrap_or(false)
    }

    /// Take the waiting frame, leaving the slot empty.
    pub fn take_fresh(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|mut latest| latest.take())
    }

    /// Drop any waiting frame.
    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            latest.take();
        }
    }
}
