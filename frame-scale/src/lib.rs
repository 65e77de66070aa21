// SPDX-License-Identifier: MIT
//! # frame-scale: Bandwidth-Bounded Frame Downscaling
//!
//! This crate computes scaling plans and performs SIMD-accelerated RGBA
//! resizing for frames that are about to be JPEG-encoded and shipped to a
//! remote inference service.
//!
//! ## Design Rules
//!
//! 1. **Never upscale**: the scale factor is `min(1, limit / side)`
//! 2. **Preserve aspect ratio**: both sides use the same factor
//! 3. **Reuse buffers**: callers own the destination and staging storage
//!
//! ## Key Components
//!
//! - [`plan`]: Scaling plan computation and width presets
//! - [`cpu`]: CPU scaling built on `fast_image_resize`
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use frame_scale::{cpu::scale_rgba_cpu, plan::{build_plan, ScaleTarget, Size}};
//!
//! let input = Size { w: 1920, h: 1080 };
//! let plan = build_plan(input, ScaleTarget::MaxWidth(640));
//! assert_eq!((plan.out.w, plan.out.h), (640, 360));
//!
//! let mut resizer = fast_image_resize::Resizer::new();
//! let mut output = vec![0u8; plan.out_len()];
//! scale_rgba_cpu(&mut resizer, &rgba, input, Some(1920 * 4), &plan, &mut output, None)?;
//! ```

pub mod cpu;
pub mod plan;
