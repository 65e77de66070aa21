// SPDX-License-Identifier: MIT
//! # Scaling Plan Computation
//!
//! Computes the output dimensions for a frame before it is encoded. Plans are
//! aspect-preserving and never enlarge the source: a frame that already fits
//! the limit is passed through at its native size.
//!
//! - All computations use floating-point but round to integers
//! - Outputs are clamped to at least 1px on each side

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Defines the size constraint for a scaling plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the width, derive the height proportionally.
    MaxWidth(u32),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target constraint used for planning
    pub target: ScaleTarget,
    /// Factor applied to both sides, always in `(0, 1]`
    pub factor: f64,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the plan leaves the frame at its native size.
    pub fn is_identity(&self) -> bool {
        self.out == self.input
    }

    /// Byte length of an RGBA8 buffer holding the planned output.
    pub fn out_len(&self) -> usize {
        self.out.w as usize * self.out.h as usize * 4
    }
}

/// Scale factor for a source side against a limit: `min(1, limit / side)`.
///
/// A zero limit or zero side yields `1.0` so that degenerate inputs are passed
/// through instead of collapsing to nothing.
pub fn scale_factor(side: u32, limit: u32) -> f64 {
    if side == 0 || limit == 0 {
        return 1.0;
    }
    (limit as f64 / side as f64).min(1.0)
}

/// Compute a scaling plan from input dimensions and a target constraint.
///
/// # Performance
/// O(1) computation with a handful of floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget) -> ScalePlan {
    let factor = match target {
        ScaleTarget::MaxWidth(max_w) => scale_factor(input.w, max_w),
    };

    let out = if factor >= 1.0 {
        input
    } else {
        Size {
            w: ((input.w as f64 * factor).round() as u32).max(1),
            h: ((input.h as f64 * factor).round() as u32).max(1),
        }
    };

    ScalePlan {
        input,
        target,
        factor,
        out,
    }
}

/// Encode-width presets exposed on the command line.
///
/// Each preset clamps the encoded width; narrower frames mean smaller JPEGs
/// and cheaper inference per frame on the service side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum WidthPreset {
    /// 320px wide, for constrained uplinks
    #[value(name = "low")]
    Low,
    /// 480px wide
    #[value(name = "medium")]
    Medium,
    /// 640px wide, a good match for typical detector input sizes
    #[value(name = "high")]
    High,
    /// 1280px wide, for when bandwidth is not a concern
    #[value(name = "full")]
    Full,
}

impl WidthPreset {
    /// Maximum encode width in pixels for this preset.
    pub fn max_width(self) -> u32 {
        match self {
            WidthPreset::Low => 320,
            WidthPreset::Medium => 480,
            WidthPreset::High => 640,
            WidthPreset::Full => 1280,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downscale_wide_frame() {
        let plan = build_plan(Size { w: 1920, h: 1080 }, ScaleTarget::MaxWidth(640));
        assert_eq!(plan.out, Size { w: 640, h: 360 });
        assert!(!plan.is_identity());
        assert_eq!(plan.out_len(), 640 * 360 * 4);
    }

    #[test]
    fn test_never_upscales() {
        for (w, m) in [(320u32, 640u32), (640, 640), (1, 1000), (1279, 1280)] {
            let plan = build_plan(Size { w, h: 240 }, ScaleTarget::MaxWidth(m));
            assert_eq!(plan.out.w, w);
            assert!(plan.is_identity());
        }
    }

    #[test]
    fn test_encoded_width_bounded_by_min_of_source_and_limit() {
        for w in [1u32, 17, 333, 640, 641, 1000, 1920, 4096] {
            for m in [1u32, 100, 320, 640, 1280] {
                let plan = build_plan(Size { w, h: 480 }, ScaleTarget::MaxWidth(m));
                let expected = ((w as f64) * scale_factor(w, m)).round() as u32;
                assert_eq!(plan.out.w, expected.max(1), "w={w} m={m}");
                assert!(plan.out.w <= w.min(m).max(1), "w={w} m={m}");
            }
        }
    }

    #[test]
    fn test_portrait_frame_clamped_by_width() {
        let plan = build_plan(Size { w: 720, h: 1280 }, ScaleTarget::MaxWidth(360));
        assert_eq!(plan.out, Size { w: 360, h: 640 });
    }

    #[test]
    fn test_degenerate_limit_passes_through() {
        let plan = build_plan(Size { w: 800, h: 600 }, ScaleTarget::MaxWidth(0));
        assert!(plan.is_identity());
    }

    #[test]
    fn test_preset_widths() {
        assert_eq!(WidthPreset::High.max_width(), 640);
        assert_eq!(WidthPreset::Low.max_width(), 320);
    }
}
