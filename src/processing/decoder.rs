//! Decoding of annotated frames returned by the service.

use image::RgbaImage;

use crate::error::{StreamError, StreamResult};

/// Decode a service reply into RGBA pixels. The image's own dimensions are
/// authoritative; callers size their surfaces from the result.
pub fn decode_annotated(payload: &[u8]) -> StreamResult<RgbaImage> {
    if payload.is_empty() {
        return Err(StreamError::decode("empty payload"));
    }
    let image = image::load_from_memory(payload)
        .map_err(|e| StreamError::decode(format!("undecodable frame ({} bytes): {e}", payload.len())))?;
    Ok(image.to_rgba8())
}
