//! # Live Annotation Client
//!
//! Streams camera frames to a remote object-detection service and shows the
//! annotated frames it sends back, with backpressure so that at most one
//! frame is ever waiting on the service.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: Live frame sources (FFmpeg devices, test pattern)
//! - `processing`: JPEG encode with downscaling, decode, multipart parsing
//! - `transport`: The duplex WebSocket connection to the service
//! - `render`: Surfaces annotated frames are drawn to
//! - `session`: Session state machine, frame pump, reactor and driver
//! - `confidence`: Debounced confidence-threshold pushes
//! - `client`: Request/response endpoints (image, video, health)
//! - `config`: Endpoint layout and per-session quality settings
//!
//! ## Data flow
//!
//! ```text
//! ┌─────────┐ frame ┌────────┐ jpeg ┌───────────┐        ┌─────────┐
//! │ Capture │──────▶│ Encode │─────▶│ WebSocket │───────▶│ Service │
//! └─────────┘       └────────┘      └───────────┘        └─────────┘
//!      ▲                                  │ annotated jpeg
//!      │ next tick   ┌────────┐  ┌────────▼─┐
//!      └─────────────│ Render │◀─│  Decode  │
//!                    └────────┘  └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use live_annotate::{LiveOptions, SourceSpec, run_live};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = LiveOptions {
//!     source: SourceSpec::Synthetic { width: 640, height: 480 },
//!     duration: Some(std::time::Duration::from_secs(10)),
//!     ..LiveOptions::default()
//! };
//! let stats = run_live(options).await?;
//! println!("sent {} frames", stats.sent);
//! # Ok(())
//! # }
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

pub mod capture;
pub mod client;
pub mod confidence;
pub mod config;
pub mod core;
pub mod error;
pub mod processing;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod transport;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, HasSeverity, StreamError, StreamResult};

pub use session::{Session, SessionEvent, SessionState, SessionStats, TickOutcome};

use capture::{CaptureSource, FfmpegCaptureSource, FfmpegInput, SyntheticSource};
use client::ServiceClient;
use confidence::ConfidenceChannel;
use config::{ClientConfig, QualityConfig};
use error::classify;
use render::{FileSurface, MemorySurface, RenderSurface};
use session::{LiveView, drive};
use transport::WsConnection;

/// Which capture source a live run uses.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    Device(FfmpegInput),
    Synthetic { width: u32, height: u32 },
}

impl SourceSpec {
    fn build(&self) -> Box<dyn CaptureSource> {
        match self {
            SourceSpec::Device(input) => Box::new(FfmpegCaptureSource::new(input.clone())),
            SourceSpec::Synthetic { width, height } => {
                Box::new(SyntheticSource::new(*width, *height))
            }
        }
    }
}

/// Everything a live run needs.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub client: ClientConfig,
    pub quality: QualityConfig,
    pub source: SourceSpec,
    /// Where the latest annotated frame is written. `None` keeps it in memory.
    pub output: Option<PathBuf>,
    /// Stop after this long. `None` runs until Ctrl-C or the service closes.
    pub duration: Option<Duration>,
    /// Confidence threshold to push before streaming.
    pub confidence: Option<f32>,
    /// Accept new thresholds typed on stdin, one per line, while streaming.
    pub confidence_from_stdin: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            quality: QualityConfig::default(),
            source: SourceSpec::Device(FfmpegInput::default()),
            output: None,
            duration: None,
            confidence: None,
            confidence_from_stdin: false,
        }
    }
}

/// Run one live session to completion.
///
/// Stops on Ctrl-C, when `duration` elapses, or when the service closes or
/// breaks the connection. Returns the session's counters.
pub async fn run_live(options: LiveOptions) -> Result<SessionStats> {
    options.client.validate().map_err(anyhow::Error::msg)?;
    options.quality.validate().map_err(anyhow::Error::msg)?;

    let ws_url = options.client.ws_url()?;
    let service = Arc::new(ServiceClient::new(options.client.clone())?);
    let confidence = ConfidenceChannel::new(service, options.client.confidence_debounce);
    if let Some(conf) = options.confidence {
        confidence.set_confidence(conf)?;
    }

    let quality = options.quality;
    let source = options.source.clone();
    let output = options.output.clone();
    let mut view = LiveView::new(move || -> StreamResult<Session> {
        let surface: Box<dyn RenderSurface> = match &output {
            Some(path) => Box::new(FileSurface::new(path)?),
            None => Box::new(MemorySurface::new()),
        };
        Session::new(
            quality,
            source.build(),
            Box::new(WsConnection::new(ws_url.clone())),
            surface,
        )
    });

    info!(
        "Streaming to {} (max width {}, quality {:.2}, every {} frame(s))",
        options.client.server, quality.max_encode_width, quality.encode_quality, quality.send_every_n
    );
    let reactor = view.start().map_err(start_failure)?;

    let events = reactor.sender();
    let duration = options.duration;
    let stopper = tokio::spawn(async move {
        match duration {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = tokio::time::sleep(limit) => info!("Duration elapsed"),
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        let _ = events.send(SessionEvent::Stop);
    });

    let feeder = options.confidence_from_stdin.then(|| {
        info!("Type a confidence threshold in [0, 1] and press Enter to change it");
        let channel = confidence.clone();
        let lines = stdin_lines();
        tokio::spawn(async move { channel.apply_updates(lines).await })
    });

    let stats = drive(reactor, options.client.idle_poll).await;
    stopper.abort();
    if let Some(feeder) = feeder {
        feeder.abort();
    }

    let last_error = view
        .active()
        .and_then(|reactor| reactor.session().last_error().map(str::to_string));
    view.stop();
    confidence.flush().await;

    if let Some(reason) = last_error {
        warn!("Session ended with error: {}", reason);
    }
    info!(
        "Captured {} frames, sent {}, received {} ({} skipped)",
        stats.captured, stats.sent, stats.received, stats.skipped
    );
    Ok(stats)
}

fn start_failure(error: StreamError) -> anyhow::Error {
    if let Some(hint) = error.recovery_suggestion() {
        info!("Hint: {}", hint);
    }
    let what = if classify::is_user_error(&error) {
        "invalid live session settings"
    } else {
        "failed to start live session"
    };
    anyhow::Error::new(error).context(what)
}

/// Lines typed on stdin, forwarded from a detached reader thread.
fn stdin_lines() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
