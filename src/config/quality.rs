//! Per-session encode parameters.
//!
//! A `QualityConfig` is fixed for the lifetime of a session; changing it
//! means stopping and starting a new session. The detection-confidence knob
//! is not part of it; see `crate::confidence`.

use frame_scale::plan::{ScaleTarget, WidthPreset};

/// Immutable per-session encode parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityConfig {
    /// Frames wider than this are downscaled before encoding. Never upscales.
    pub max_encode_width: u32,

    /// JPEG quality in `[0, 1]`; 0 still encodes at the lowest JPEG quality (1).
    pub encode_quality: f32,

    /// Only every Nth ready frame is sent. Must be at least 1.
    pub send_every_n: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_encode_width: WidthPreset::High.max_width(),
            encode_quality: 0.7,
            send_every_n: 1,
        }
    }
}

impl QualityConfig {
    pub fn new(max_encode_width: u32, encode_quality: f32, send_every_n: u32) -> Self {
        Self {
            max_encode_width,
            encode_quality,
            send_every_n,
        }
    }

    /// Start from a width preset with default quality and cadence.
    pub fn from_preset(preset: WidthPreset) -> Self {
        Self {
            max_encode_width: preset.max_width(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_encode_width == 0 {
            return Err("Max encode width must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.encode_quality) {
            return Err(format!(
                "Encode quality must be in [0, 1], got {}",
                self.encode_quality
            ));
        }
        if self.send_every_n == 0 {
            return Err("send_every_n must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn scale_target(&self) -> ScaleTarget {
        ScaleTarget::MaxWidth(self.max_encode_width)
    }

    /// JPEG encoder quality on the 1–100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.encode_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_validation() {
        assert!(QualityConfig::default().validate().is_ok());
        assert!(QualityConfig::new(0, 0.5, 1).validate().is_err());
        assert!(QualityConfig::new(640, 0.0, 1).validate().is_ok());
        assert!(QualityConfig::new(640, -0.1, 1).validate().is_err());
        assert!(QualityConfig::new(640, 1.5, 1).validate().is_err());
        assert!(QualityConfig::new(640, f32::NAN, 1).validate().is_err());
        assert!(QualityConfig::new(640, 0.5, 0).validate().is_err());
        assert!(QualityConfig::new(640, 1.0, 4).validate().is_ok());
    }

    #[test]
    fn test_jpeg_quality_scale() {
        assert_eq!(QualityConfig::new(640, 0.7, 1).jpeg_quality(), 70);
        assert_eq!(QualityConfig::new(640, 0.001, 1).jpeg_quality(), 1);
        assert_eq!(QualityConfig::new(640, 0.0, 1).jpeg_quality(), 1);
        assert_eq!(QualityConfig::new(640, 1.0, 1).jpeg_quality(), 100);
    }

    #[test]
    fn test_preset_sets_width_only() {
        let q = QualityConfig::from_preset(WidthPreset::Low);
        assert_eq!(q.max_encode_width, 320);
        assert_eq!(q.send_every_n, 1);
    }
}
