//! # Live Session
//!
//! One live-streaming attempt: capture, encode, send, receive, render.
//!
//! ## State machine
//!
//! ```text
//!          start()            ConnectionOpened
//!  Idle ─────────────▶ Connecting ───────────────▶ Active
//!   │ acquire fails        │                         │
//!   └──────▶ Errored ◀─────┴── ConnectionError ──────┤
//!                          │                         │
//!            Closed ◀──────┴── Stop / ConnectionClosed
//! ```
//!
//! `Closed` and `Errored` are terminal. Both tear down the same way: the
//! connection is closed, the capture source released and the surface put
//! back into its placeholder state. There is no reconnection; a new session
//! has to be built.
//!
//! ## Event handling
//!
//! Everything that happens to a session arrives as a `SessionEvent` and is
//! handled to completion before the next one. The reactor (`reactor.rs`)
//! owns the queue; the connection task only ever posts events to it.

pub mod driver;
pub mod live;
pub mod pump;
pub mod reactor;

pub use driver::drive;
pub use live::{LiveView, SessionFactory, View};
pub use pump::FramePump;
pub use reactor::{Reactor, Step};

use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::capture::CaptureSource;
use crate::config::QualityConfig;
use crate::error::{StreamError, StreamResult, classify};
use crate::processing::{FrameEncoder, decode_annotated};
use crate::render::RenderSurface;
use crate::telemetry::TelemetryTracker;
use crate::transport::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// Connecting or Active: resources are held.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

/// Something that happened to a session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Run one frame pump decision.
    Tick,
    ConnectionOpened,
    /// An annotated frame from the service.
    Message {
        payload: Vec<u8>,
        received_at: Instant,
    },
    ConnectionError {
        reason: String,
    },
    ConnectionClosed {
        reason: Option<String>,
    },
    /// User asked to stop (button, view switch, Ctrl-C).
    Stop,
}

/// Where connections and timers post their events.
pub type EventSender = UnboundedSender<SessionEvent>;

/// Whether the frame pump should be ticked again right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Reschedule,
    Idle,
}

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session is not Active.
    Inactive,
    /// A frame is awaiting its reply.
    Backpressured,
    /// No fresh frame from the capture source.
    NotReady,
    /// Frame counted but dropped by the `send_every_n` cadence.
    Skipped,
    EncodeFailed,
    /// Connection not open or refused the frame.
    SendFailed,
    Sent {
        width: u32,
        height: u32,
        bytes: usize,
    },
}

impl TickOutcome {
    /// Whether the pump re-arms itself after this outcome. After `Sent` the
    /// reply re-arms it; while inactive or backpressured nothing does.
    pub fn reschedules(self) -> bool {
        matches!(
            self,
            TickOutcome::NotReady
                | TickOutcome::Skipped
                | TickOutcome::EncodeFailed
                | TickOutcome::SendFailed
        )
    }
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Ready frames taken from the capture source.
    pub captured: u64,
    pub sent: u64,
    pub received: u64,
    pub skipped: u64,
    pub send_failures: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,
}

pub struct Session {
    state: SessionState,
    quality: QualityConfig,
    pump: FramePump,
    encoder: FrameEncoder,
    telemetry: TelemetryTracker,
    capture: Box<dyn CaptureSource>,
    connection: Box<dyn Connection>,
    surface: Box<dyn RenderSurface>,
    stats: SessionStats,
    last_error: Option<String>,
}

impl Session {
    pub fn new(
        quality: QualityConfig,
        capture: Box<dyn CaptureSource>,
        connection: Box<dyn Connection>,
        surface: Box<dyn RenderSurface>,
    ) -> StreamResult<Self> {
        quality
            .validate()
            .map_err(|reason| StreamError::config("quality", format!("{quality:?}"), reason))?;
        Ok(Self {
            state: SessionState::Idle,
            quality,
            pump: FramePump::new(quality.send_every_n),
            encoder: FrameEncoder::new(quality),
            telemetry: TelemetryTracker::new(),
            capture,
            connection,
            surface,
            stats: SessionStats::default(),
            last_error: None,
        })
    }

    /// Acquire the capture source and begin connecting.
    ///
    /// If the source cannot be acquired the session goes straight to
    /// `Errored` and no connection is attempted.
    pub fn start(&mut self, events: EventSender) -> StreamResult<()> {
        if self.state != SessionState::Idle {
            return Err(StreamError::state(
                format!("{:?}", self.state),
                "start",
                "a session can only be started once",
            ));
        }

        if let Err(e) = self.capture.acquire() {
            self.report("Acquiring capture", &e);
            if self.last_error.is_none() {
                self.last_error = Some(e.to_string());
            }
            self.capture.release();
            self.surface.show_placeholder();
            self.state = SessionState::Errored;
            return Err(e);
        }

        if let Err(e) = self.connection.open(events) {
            self.report("Opening the connection", &e);
            if self.last_error.is_none() {
                self.last_error = Some(e.to_string());
            }
            self.teardown(SessionState::Errored);
            return Err(e);
        }

        self.state = SessionState::Connecting;
        info!(
            "Session connecting to {} with {}",
            self.connection.endpoint(),
            self.capture.describe()
        );
        Ok(())
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: SessionEvent) -> Control {
        match event {
            SessionEvent::Tick => {
                if self.tick().reschedules() {
                    Control::Reschedule
                } else {
                    Control::Idle
                }
            }
            SessionEvent::ConnectionOpened => self.on_open(),
            SessionEvent::Message {
                payload,
                received_at,
            } => self.on_message(&payload, received_at),
            SessionEvent::ConnectionError { reason } => {
                if self.state.is_live() {
                    warn!("Connection error: {}", reason);
                    self.last_error = Some(reason);
                    self.teardown(SessionState::Errored);
                }
                Control::Idle
            }
            SessionEvent::ConnectionClosed { reason } => {
                if self.state.is_live() {
                    info!(
                        "Connection closed by peer{}",
                        reason
                            .as_deref()
                            .filter(|r| !r.is_empty())
                            .map(|r| format!(": {r}"))
                            .unwrap_or_default()
                    );
                    self.teardown(SessionState::Closed);
                }
                Control::Idle
            }
            SessionEvent::Stop => {
                self.stop();
                Control::Idle
            }
        }
    }

    /// One frame pump decision.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != SessionState::Active {
            return TickOutcome::Inactive;
        }
        if self.pump.in_flight() {
            return TickOutcome::Backpressured;
        }
        if !self.capture.frame_ready() {
            return TickOutcome::NotReady;
        }
        let Some(frame) = self.capture.current_frame() else {
            return TickOutcome::NotReady;
        };

        self.stats.captured += 1;
        if !self.pump.count_frame() {
            self.stats.skipped += 1;
            return TickOutcome::Skipped;
        }

        let encoded = match self.encoder.encode(&frame) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.report(&format!("Encoding frame {}", frame.sequence), &e);
                self.stats.encode_failures += 1;
                return TickOutcome::EncodeFailed;
            }
        };

        if !self.connection.ready_state().is_open() {
            self.stats.send_failures += 1;
            return TickOutcome::SendFailed;
        }

        let (width, height, bytes) = (encoded.width, encoded.height, encoded.bytes.len());
        self.pump.mark_in_flight();
        match self.connection.send(encoded.bytes) {
            Ok(()) => {
                self.stats.sent += 1;
                TickOutcome::Sent {
                    width,
                    height,
                    bytes,
                }
            }
            Err(e) => {
                self.report("Sending", &e);
                self.pump.complete();
                self.stats.send_failures += 1;
                TickOutcome::SendFailed
            }
        }
    }

    /// Stop the session. No-op once terminal.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Idle => self.state = SessionState::Closed,
            SessionState::Connecting | SessionState::Active => {
                info!("Stopping session");
                self.teardown(SessionState::Closed);
            }
            SessionState::Closed | SessionState::Errored => {}
        }
    }

    fn on_open(&mut self) -> Control {
        if self.state != SessionState::Connecting {
            return Control::Idle;
        }
        self.pump.reset();
        self.telemetry.reset();
        self.surface.show_fps(None);
        self.state = SessionState::Active;
        info!("Session active on {}", self.connection.endpoint());
        Control::Reschedule
    }

    fn on_message(&mut self, payload: &[u8], received_at: Instant) -> Control {
        if self.state != SessionState::Active {
            debug!("Ignoring {} byte message while {:?}", payload.len(), self.state);
            return Control::Idle;
        }
        self.stats.received += 1;

        match decode_annotated(payload) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                self.surface.resize(width, height);
                if let Err(e) = self.surface.draw(&image) {
                    self.report("Rendering", &e);
                }
                let fps = self.telemetry.record(received_at);
                self.surface.show_fps(fps);
            }
            Err(e) => {
                self.report("Decoding reply", &e);
                self.stats.decode_failures += 1;
            }
        }

        self.pump.complete();
        Control::Reschedule
    }

    /// Log a failure at the level its class calls for. Failures that end the
    /// session are kept as `last_error`; per-frame ones are not.
    fn report(&mut self, doing: &str, error: &StreamError) {
        if classify::is_fatal_to_session(error) {
            warn!("{} failed ({}): {}", doing, error.category(), error);
            self.last_error = Some(error.to_string());
        } else if classify::is_recovered_locally(error) {
            debug!("{} failed, frame skipped: {}", doing, error);
        } else {
            warn!("{} failed: {}", doing, error);
        }
    }

    fn teardown(&mut self, terminal: SessionState) {
        self.connection.close();
        self.capture.release();
        self.pump.reset();
        self.telemetry.reset();
        self.surface.show_fps(None);
        self.surface.show_placeholder();
        self.state = terminal;
        info!(
            "Session {:?}: sent {} received {} skipped {} (send failures {}, decode failures {})",
            terminal,
            self.stats.sent,
            self.stats.received,
            self.stats.skipped,
            self.stats.send_failures,
            self.stats.decode_failures
        );
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }

    pub fn in_flight(&self) -> bool {
        self.pump.in_flight()
    }

    pub fn frame_counter(&self) -> u64 {
        self.pump.frame_counter()
    }

    pub fn smoothed_fps(&self) -> Option<f64> {
        self.telemetry.smoothed_fps()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state.is_live() {
            self.teardown(SessionState::Closed);
        }
    }
}
