//! # Frame Encoder
//!
//! Downscale-then-JPEG for outgoing frames.
//!
//! ```text
//! Frame (RGBA, any stride) ──▶ build_plan(MaxWidth) ──▶ resize? ──▶ RGB ──▶ JPEG
//! ```
//!
//! The resize step is skipped entirely when the plan is the identity, which
//! is the common case for cameras at or below the width cap. Scratch buffers
//! live on the encoder and are reused across frames.

use fast_image_resize::Resizer;
use frame_scale::cpu::{Staging, scale_rgba_cpu};
use frame_scale::plan::{Size, build_plan};
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::config::QualityConfig;
use crate::core::Frame;
use crate::error::{StreamError, StreamResult};

/// JPEG bytes ready for the wire, with the dimensions they were encoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Reusable encoder bound to one session's `QualityConfig`.
pub struct FrameEncoder {
    quality: QualityConfig,
    resizer: Resizer,
    scaled: Vec<u8>,
    staging: Staging,
    rgb: Vec<u8>,
}

impl FrameEncoder {
    pub fn new(quality: QualityConfig) -> Self {
        Self {
            quality,
            resizer: Resizer::new(),
            scaled: Vec::new(),
            staging: Staging::default(),
            rgb: Vec::new(),
        }
    }

    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }

    pub fn encode(&mut self, frame: &Frame) -> StreamResult<EncodedFrame> {
        if frame.width == 0 || frame.height == 0 {
            return Err(StreamError::encode(format!(
                "cannot encode empty frame {}x{}",
                frame.width, frame.height
            )));
        }

        let plan = build_plan(frame.size(), self.quality.scale_target());
        let (pixels, stride): (&[u8], usize) = if plan.is_identity() {
            (frame.data.as_slice(), frame.stride)
        } else {
            self.scaled.resize(plan.out_len(), 0);
            scale_rgba_cpu(
                &mut self.resizer,
                &frame.data,
                frame.size(),
                Some(frame.stride),
                &plan,
                &mut self.scaled,
                Some(&mut self.staging),
            )
            .map_err(|e| StreamError::encode(format!("resize failed: {e}")))?;
            (self.scaled.as_slice(), plan.out.w as usize * 4)
        };

        rgba_to_rgb(pixels, stride, plan.out, &mut self.rgb)?;

        let mut bytes = Vec::with_capacity(self.rgb.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality.jpeg_quality());
        encoder
            .encode(&self.rgb, plan.out.w, plan.out.h, ExtendedColorType::Rgb8)
            .map_err(|e| StreamError::encode(format!("jpeg encode failed: {e}")))?;

        Ok(EncodedFrame {
            bytes,
            width: plan.out.w,
            height: plan.out.h,
        })
    }
}

/// Drop the alpha channel, compacting strided rows into `dst`.
fn rgba_to_rgb(src: &[u8], stride: usize, size: Size, dst: &mut Vec<u8>) -> StreamResult<()> {
    let row_bytes = size.w as usize * 4;
    let rows = size.h as usize;
    if stride < row_bytes || src.len() < stride * (rows - 1) + row_bytes {
        return Err(StreamError::encode(format!(
            "pixel buffer of {} bytes too short for {}x{} at stride {}",
            src.len(),
            size.w,
            size.h,
            stride
        )));
    }

    dst.clear();
    dst.reserve(size.w as usize * rows * 3);
    for row in src.chunks(stride).take(rows) {
        for px in row[..row_bytes].chunks_exact(4) {
            dst.extend_from_slice(&px[..3]);
        }
    }
    Ok(())
}
