//! # Service Client Configuration
//!
//! Where the annotation service lives and how its endpoints are laid out. The
//! same structure is consumed by the CLI, the WebSocket transport and the
//! HTTP client.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Default | Description |
//! |-----------|---------|-------------|
//! | `server` | `http://127.0.0.1:8000` | Base URL of the service |
//! | `ws_path` | `/ws/detect` | Live duplex stream |
//! | `confidence_path` | `/set_confidence` | Confidence push |
//! | `detect_image_path` | `/detect_image` | One-shot image annotation |
//! | `upload_video_path` | `/upload_video` | Video upload |
//! | `stream_video_path` | `/stream_video` | Keyed playback (`/{video_id}` appended) |
//! | `feed_path` | `/video_feed` | Server-side camera feed |
//! | `health_path` | `/health` | Liveness probe |
//! | `confidence_debounce` | 200 ms | Debounce window for confidence pushes |
//! | `idle_poll` | 5 ms | Wait between ticks while no frame is ready |
//!
//! ## Examples
//!
//! ```rust
//! use live_annotate::config::ClientConfig;
//!
//! let config = ClientConfig::with_server("https://detector.example.com");
//! assert!(config.validate().is_ok());
//! assert_eq!(
//!     config.ws_url().unwrap().as_str(),
//!     "wss://detector.example.com/ws/detect"
//! );
//! ```

use std::time::Duration;

use reqwest::Url;

use crate::error::{StreamError, StreamResult};

/// Default base URL of the annotation service.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

/// Default debounce window for confidence pushes.
pub const DEFAULT_CONFIDENCE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Endpoint layout and timing knobs for talking to the annotation service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, `http` or `https`. The WebSocket URL is derived from it.
    pub server: String,
    pub ws_path: String,
    pub confidence_path: String,
    pub detect_image_path: String,
    pub upload_video_path: String,
    pub stream_video_path: String,
    pub feed_path: String,
    pub health_path: String,

    /// Quiet period before the latest confidence value is pushed.
    pub confidence_debounce: Duration,

    /// How long the live driver waits for an external event before ticking
    /// again when the capture source had no fresh frame.
    pub idle_poll: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            ws_path: "/ws/detect".to_string(),
            confidence_path: "/set_confidence".to_string(),
            detect_image_path: "/detect_image".to_string(),
            upload_video_path: "/upload_video".to_string(),
            stream_video_path: "/stream_video".to_string(),
            feed_path: "/video_feed".to_string(),
            health_path: "/health".to_string(),
            confidence_debounce: DEFAULT_CONFIDENCE_DEBOUNCE,
            idle_poll: Duration::from_millis(5),
        }
    }
}

impl ClientConfig {
    /// Default layout against a specific server.
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.server)
            .map_err(|e| format!("Server URL '{}' is invalid: {}", self.server, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Server URL must use http or https, got '{}'",
                url.scheme()
            ));
        }
        for (name, path) in [
            ("ws_path", &self.ws_path),
            ("confidence_path", &self.confidence_path),
            ("detect_image_path", &self.detect_image_path),
            ("upload_video_path", &self.upload_video_path),
            ("stream_video_path", &self.stream_video_path),
            ("feed_path", &self.feed_path),
            ("health_path", &self.health_path),
        ] {
            if !path.starts_with('/') {
                return Err(format!("{} must start with '/', got '{}'", name, path));
            }
        }
        if self.confidence_debounce.is_zero() {
            return Err("Confidence debounce must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Absolute URL for an HTTP endpoint path.
    pub fn endpoint(&self, path: &str) -> StreamResult<Url> {
        let base = Url::parse(&self.server)
            .map_err(|e| StreamError::config("server", &self.server, e.to_string()))?;
        base.join(path)
            .map_err(|e| StreamError::config("path", path, e.to_string()))
    }

    /// WebSocket URL of the live stream (`http→ws`, `https→wss`).
    pub fn ws_url(&self) -> StreamResult<Url> {
        let mut url = self.endpoint(&self.ws_path)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| StreamError::config("server", &self.server, "cannot derive ws scheme"))?;
        Ok(url)
    }

    /// Playback URL for a previously uploaded video.
    pub fn stream_video_url(&self, video_id: &str) -> StreamResult<Url> {
        let mut url = self.endpoint(&self.stream_video_path)?;
        url.path_segments_mut()
            .map_err(|_| StreamError::config("server", &self.server, "cannot-be-a-base URL"))?
            .pop_if_empty()
            .push(video_id);
        Ok(url)
    }
}
