//! # Telemetry
//!
//! Response-rate tracking for live sessions, plus tracing setup for the
//! binary.
//!
//! The FPS estimate is an exponential moving average over the gaps between
//! annotated frames arriving from the service:
//!
//! ```text
//! instant  = 1000 / gap_ms
//! smoothed = smoothed * 0.9 + instant * 0.1   (first sample: instant)
//! ```

use std::time::Instant;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const HISTORY_WEIGHT: f64 = 0.9;
const SAMPLE_WEIGHT: f64 = 0.1;

/// EMA frame-rate estimator.
#[derive(Debug, Clone, Default)]
pub struct TelemetryTracker {
    last: Option<Instant>,
    smoothed: Option<f64>,
    samples: u64,
}

impl TelemetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame arriving at `now` and return the updated estimate.
    ///
    /// The first frame only sets the reference point. A zero (or backwards)
    /// gap yields no sample.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        if let Some(last) = self.last {
            let gap_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
            if gap_ms > 0.0 {
                let instant = 1000.0 / gap_ms;
                self.smoothed = Some(match self.smoothed {
                    None => instant,
                    Some(prev) => prev * HISTORY_WEIGHT + instant * SAMPLE_WEIGHT,
                });
                self.samples += 1;
            }
        }
        self.last = Some(now);
        self.smoothed
    }

    pub fn smoothed_fps(&self) -> Option<f64> {
        self.smoothed
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .try_init();
}
