//! # Core Infrastructure Module
//!
//! Frame representation and the latest-wins handoff buffer used between
//! capture threads and the frame pump.

pub mod frame;
pub mod frame_slot;

pub use frame::Frame;
pub use frame_slot::FrameSlot;
