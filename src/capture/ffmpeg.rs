//! # FFmpeg Capture Source
//!
//! Reads raw RGBA frames from an `ffmpeg` subprocess. Any FFmpeg input works;
//! the default is a V4L2 camera.
//!
//! ```text
//! ┌──────────────┐  rawvideo/rgba  ┌───────────────┐  publish  ┌───────────┐
//! │ ffmpeg child │────────────────▶│ reader thread │──────────▶│ FrameSlot │
//! │ (-f v4l2 …)  │     stdout      │ (exact reads) │           │ (latest)  │
//! └──────────────┘                 └───────────────┘           └───────────┘
//! ```
//!
//! The reader thread blocks on the pipe so the frame pump never has to.
//!
//! | Platform | Default input format | Default device |
//! |----------|----------------------|----------------|
//! | Linux | `v4l2` | `/dev/video0` |
//! | macOS | `avfoundation` | `0` |
//! | Windows | `dshow` | `video=Integrated Camera` |

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::capture::CaptureSource;
use crate::core::{Frame, FrameSlot};
use crate::error::{StreamError, StreamResult};

/// What FFmpeg should open.
#[derive(Debug, Clone)]
pub struct FfmpegInput {
    /// FFmpeg demuxer (`-f`), e.g. `v4l2`.
    pub format: String,
    /// Device or URL passed to `-i`.
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Requested capture rate; `None` lets the device pick.
    pub framerate: Option<u32>,
}

impl Default for FfmpegInput {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        let (format, device) = ("avfoundation", "0");
        #[cfg(target_os = "windows")]
        let (format, device) = ("dshow", "video=Integrated Camera");
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let (format, device) = ("v4l2", "/dev/video0");

        Self {
            format: format.to_string(),
            device: device.to_string(),
            width: 640,
            height: 480,
            framerate: None,
        }
    }
}

impl FfmpegInput {
    /// Arguments for the capture subprocess.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "-video_size".to_string(),
            format!("{}x{}", self.width, self.height),
        ];
        if let Some(fps) = self.framerate {
            args.push("-framerate".to_string());
            args.push(fps.to_string());
        }
        args.extend([
            "-i".to_string(),
            self.device.clone(),
            "-an".to_string(),
            // Output exactly the size we announced, whatever the device negotiated.
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-".to_string(),
        ]);
        args
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Live device source backed by an `ffmpeg` subprocess.
pub struct FfmpegCaptureSource {
    input: FfmpegInput,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl FfmpegCaptureSource {
    pub fn new(input: FfmpegInput) -> Self {
        Self {
            input,
            slot: Arc::new(FrameSlot::new()),
            running: Arc::new(AtomicBool::new(false)),
            child: None,
            reader: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl CaptureSource for FfmpegCaptureSource {
    fn acquire(&mut self) -> StreamResult<()> {
        if self.child.is_some() {
            return Ok(());
        }
        if self.input.width == 0 || self.input.height == 0 {
            return Err(StreamError::acquisition(
                self.describe(),
                "capture size must be non-zero",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(self.input.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                StreamError::acquisition(self.describe(), format!("failed to spawn ffmpeg: {e}"))
                    .with_recovery_suggestion("Ensure ffmpeg is installed and on PATH")
            })?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StreamError::acquisition(
                self.describe(),
                "ffmpeg stdout not available",
            ));
        };

        self.slot.clear();
        self.running.store(true, Ordering::Release);

        let slot = Arc::clone(&self.slot);
        let running = Arc::clone(&self.running);
        let (width, height, frame_len) = (self.input.width, self.input.height, self.input.frame_len());
        let device = self.describe();

        let reader = thread::Builder::new()
            .name("capture-ffmpeg".to_string())
            .spawn(move || {
                let mut sequence = 0u64;
                loop {
                    let mut buf = vec![0u8; frame_len];
                    match stdout.read_exact(&mut buf) {
                        Ok(()) => {
                            if let Some(frame) = Frame::from_rgba(width, height, buf, sequence) {
                                slot.publish(frame);
                                sequence += 1;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                            if running.load(Ordering::Acquire) {
                                warn!("Capture device {} stopped producing frames", device);
                            }
                            break;
                        }
                        Err(e) => {
                            if running.load(Ordering::Acquire) {
                                warn!("Capture read from {} failed: {}", device, e);
                            }
                            break;
                        }
                    }
                }
                running.store(false, Ordering::Release);
                debug!("Capture reader for {} exited after {} frames", device, sequence);
            })
            .map_err(|e| {
                StreamError::acquisition(self.describe(), format!("failed to spawn reader: {e}"))
            });

        let reader = match reader {
            Ok(handle) => handle,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                self.running.store(false, Ordering::Release);
                return Err(err);
            }
        };

        info!(
            "Capturing {} at {}x{} via ffmpeg",
            self.input.device, self.input.width, self.input.height
        );
        self.child = Some(child);
        self.reader = Some(reader);
        Ok(())
    }

    fn frame_ready(&self) -> bool {
        self.slot.has_fresh()
    }

    fn current_frame(&mut self) -> Option<Frame> {
        self.slot.take_fresh()
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            let _ = child.wait();
        }
        // Killing the child closes the pipe, so the reader unblocks.
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        self.slot.clear();
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.input.format, self.input.device)
    }
}

impl Drop for FfmpegCaptureSource {
    fn drop(&mut self) {
        self.release();
    }
}
