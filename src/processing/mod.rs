//! # Processing Module
//!
//! Pixel work on both sides of the service:
//!
//! - **encoder**: downscale + JPEG for outgoing frames
//! - **decoder**: annotated replies back to RGBA
//! - **mjpeg**: multipart playback stream splitting

pub mod decoder;
pub mod encoder;
pub mod mjpeg;

pub use decoder::decode_annotated;
pub use encoder::{EncodedFrame, FrameEncoder};
pub use mjpeg::{MjpegParser, boundary_from_content_type};
