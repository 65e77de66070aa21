//! File render surface.
//!
//! Keeps the most recent annotated frame on disk. Each draw writes a sibling
//! temp file and renames it over the target, so readers never see a
//! half-written image. The format follows the target's extension; JPEG
//! targets drop the alpha channel.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::error::{StreamError, StreamResult};
use crate::render::{RenderSurface, fps_label};

pub struct FileSurface {
    path: PathBuf,
    format: ImageFormat,
    size: Option<(u32, u32)>,
    frames_written: u64,
    fps: Option<f64>,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>) -> StreamResult<Self> {
        let path = path.into();
        let format = ImageFormat::from_path(&path).map_err(|e| {
            StreamError::config("output", path.display().to_string(), e.to_string())
                .with_recovery_suggestion("Use a .jpg or .png output path")
        })?;
        Ok(Self {
            path,
            format,
            size: None,
            frames_written: 0,
            fps: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.path.with_file_name(name)
    }
}

impl RenderSurface for FileSurface {
    fn resize(&mut self, width: u32, height: u32) {
        if self.size != Some((width, height)) {
            debug!("Output {} now {}x{}", self.path.display(), width, height);
        }
        self.size = Some((width, height));
    }

    fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn draw(&mut self, image: &RgbaImage) -> StreamResult<()> {
        let tmp = self.temp_path();
        let image = DynamicImage::ImageRgba8(image.clone());
        let image = match self.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
            _ => image,
        };

        image
            .save_with_format(&tmp, self.format)
            .map_err(|e| StreamError::external("image", e).with_context(tmp.display().to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StreamError::io("rename output", e).with_path(self.path.display().to_string()))?;

        self.frames_written += 1;
        Ok(())
    }

    fn show_fps(&mut self, fps: Option<f64>) {
        self.fps = fps;
        if self.frames_written > 0 && self.frames_written % 30 == 0 {
            debug!("{} ({} frames written)", fps_label(fps), self.frames_written);
        }
    }

    fn show_placeholder(&mut self) {
        if self.frames_written > 0 {
            info!(
                "Output '{}' saved {} frames",
                self.path.display(),
                self.frames_written
            );
        }
        self.fps = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_draw_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.png");
        let mut surface = FileSurface::new(&path).unwrap();

        surface.resize(3, 2);
        surface.draw(&RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]))).unwrap();
        surface.resize(5, 4);
        surface.draw(&RgbaImage::new(5, 4)).unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (5, 4));
        assert_eq!(surface.frames_written(), 2);
        assert!(!surface.temp_path().exists());
    }

    #[test]
    fn test_jpeg_target_drops_alpha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.jpg");
        let mut surface = FileSurface::new(&path).unwrap();
        surface.resize(8, 8);
        surface.draw(&RgbaImage::new(8, 8)).unwrap();
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = FileSurface::new("frame.unknownext").err().unwrap();
        assert_eq!(err.category(), "config");
    }
}
