// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, direct write into caller-provided dst buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeAlg, ResizeOptions, Resizer};

use crate::plan::{ScalePlan, Size};

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall,
    SourceTooSmall,
    StrideMismatchAndNoStaging,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall => write!(f, "Output buffer too small"),
            ScaleError::SourceTooSmall => write!(f, "Source buffer shorter than stride * height"),
            ScaleError::StrideMismatchAndNoStaging => write!(f, "Stride mismatch but no staging buffer provided"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Pre-allocated scratch to compact strided input to tightly packed rows (only if needed).
#[derive(Default)]
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}
impl Staging {
    pub fn with_capacity(cap: usize) -> Self { Self { buf: Vec::with_capacity(cap) } }
    pub fn ensure_len(&mut self, len: usize) { if self.buf.len() < len { self.buf.resize(len, 0); } }
    pub fn as_slice(&self) -> &[u8] { &self.buf }
}

/// Main scaling entry point.
/// `src_stride_bytes`: bytes per row of source. If `Some(stride) != width*4`, rows are compacted into staging.
/// `dst` must be at least `plan.out.w * plan.out.h * 4` bytes (RGBA).
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    src_stride_bytes: Option<usize>,
    plan: &ScalePlan,
    dst: &mut [u8],
    staging: Option<&mut Staging>,
) -> Result<(), ScaleError> {
    let dst_len = plan.out_len();
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }

    let tight_row_bytes = (src.w as usize) * 4;
    let pitch = src_stride_bytes.unwrap_or(tight_row_bytes);
    if src_rgba.len() < pitch * (src.h as usize) {
        return Err(ScaleError::SourceTooSmall);
    }

    let src_view: TypedImageRef<U8x4> = if pitch == tight_row_bytes {
        TypedImageRef::<U8x4>::from_buffer(src.w, src.h, &src_rgba[..tight_row_bytes * src.h as usize])?
    } else {
        let st = staging.ok_or(ScaleError::StrideMismatchAndNoStaging)?;
        st.ensure_len(tight_row_bytes * (src.h as usize));
        compact_rows(src_rgba, pitch, st.buf.as_mut_slice(), tight_row_bytes, src.h as usize);
        TypedImageRef::<U8x4>::from_buffer(src.w, src.h, &st.buf[..tight_row_bytes * src.h as usize])?
    };

    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    // Bilinear is plenty for frames that are about to go through lossy JPEG.
    let opts = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(fir::FilterType::Bilinear))
        .use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    Ok(())
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch .. r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes .. (r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{build_plan, ScaleTarget};

    fn solid(w: u32, h: u32, stride: usize, px: [u8; 4]) -> Vec<u8> {
        let mut data = vec![0u8; stride * h as usize];
        for y in 0..h as usize {
            for x in 0..w as usize {
                data[y * stride + x * 4..y * stride + x * 4 + 4].copy_from_slice(&px);
            }
        }
        data
    }

    #[test]
    fn test_scale_solid_frame_keeps_colour() {
        let src = Size { w: 64, h: 32 };
        let data = solid(64, 32, 64 * 4, [10, 200, 30, 255]);
        let plan = build_plan(src, ScaleTarget::MaxWidth(16));
        let mut out = vec![0u8; plan.out_len()];
        scale_rgba_cpu(&mut Resizer::new(), &data, src, None, &plan, &mut out, None).unwrap();
        assert_eq!((plan.out.w, plan.out.h), (16, 8));
        for px in out.chunks_exact(4) {
            assert_eq!(&px[..3], &[10, 200, 30]);
        }
    }

    #[test]
    fn test_strided_source_requires_staging() {
        let src = Size { w: 8, h: 8 };
        let data = solid(8, 8, 8 * 4 + 16, [1, 2, 3, 255]);
        let plan = build_plan(src, ScaleTarget::MaxWidth(4));
        let mut out = vec![0u8; plan.out_len()];
        let err = scale_rgba_cpu(&mut Resizer::new(), &data, src, Some(48), &plan, &mut out, None);
        assert!(matches!(err, Err(ScaleError::StrideMismatchAndNoStaging)));

        let mut staging = Staging::with_capacity(8 * 8 * 4);
        scale_rgba_cpu(&mut Resizer::new(), &data, src, Some(48), &plan, &mut out, Some(&mut staging)).unwrap();
        assert_eq!(&out[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_short_destination_rejected() {
        let src = Size { w: 8, h: 8 };
        let data = solid(8, 8, 32, [0, 0, 0, 255]);
        let plan = build_plan(src, ScaleTarget::MaxWidth(4));
        let mut out = vec![0u8; 3];
        let err = scale_rgba_cpu(&mut Resizer::new(), &data, src, None, &plan, &mut out, None);
        assert!(matches!(err, Err(ScaleError::BufferTooSmall)));
    }
}
