//! # Confidence Channel
//!
//! Debounced push of the detection-confidence threshold to the service.
//!
//! ```text
//! set(0.3) set(0.4) set(0.5)          (200 ms quiet)
//!    │        │        │ ────────────────────────────▶ POST {"conf": 0.5}
//!    └─ timer └─ timer └─ timer (only the last one fires)
//! ```
//!
//! Pushes go through the request/response API, never the live stream, and
//! are fire-and-forget: a failed push is logged and dropped. The channel
//! has its own lifecycle and is unaffected by sessions starting or stopping,
//! so a threshold typed while frames are streaming (`apply_updates`) takes
//! effect without touching the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_CONFIDENCE_DEBOUNCE;
use crate::error::{StreamError, StreamResult};

/// Receiver of confidence updates (normally the service client).
#[async_trait]
pub trait ConfidenceSink: Send + Sync {
    async fn push_confidence(&self, conf: f32) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
struct Pending {
    value: Option<f32>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Clones share the pending value and timer.
#[derive(Clone)]
pub struct ConfidenceChannel {
    sink: Arc<dyn ConfidenceSink>,
    delay: Duration,
    pending: Arc<Mutex<Pending>>,
    pushed: Arc<AtomicU64>,
}

impl ConfidenceChannel {
    pub fn new(sink: Arc<dyn ConfidenceSink>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            pending: Arc::new(Mutex::new(Pending::default())),
            pushed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_default_delay(sink: Arc<dyn ConfidenceSink>) -> Self {
        Self::new(sink, DEFAULT_CONFIDENCE_DEBOUNCE)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new threshold and (re)arm the debounce timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_confidence(&self, value: f32) -> StreamResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(StreamError::validation(
                "conf",
                "must be a number in [0, 1]",
                value.to_string(),
            ));
        }
        let handle = Handle::try_current().map_err(|e| {
            StreamError::state("no runtime", "set_confidence", e.to_string())
        })?;

        let mut pending = lock(&self.pending);
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation += 1;
        pending.value = Some(value);

        let generation = pending.generation;
        let delay = self.delay;
        let state = Arc::clone(&self.pending);
        let sink = Arc::clone(&self.sink);
        let pushed = Arc::clone(&self.pushed);

        pending.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;

            let value = {
                let mut pending = lock(&state);
                if pending.generation != generation {
                    return;
                }
                // Disarm before pushing so a later update never aborts this push.
                pending.timer = None;
                pending.value.take()
            };
            let Some(value) = value else { return };

            match sink.push_confidence(value).await {
                Ok(()) => {
                    pushed.fetch_add(1, Ordering::Relaxed);
                    debug!("Confidence threshold set to {:.2}", value);
                }
                Err(e) => debug!("Confidence push of {:.2} discarded: {:#}", value, e),
            }
        }));
        Ok(())
    }

    /// Apply thresholds arriving as text lines until the sender goes away.
    ///
    /// Blank lines are ignored; lines that are not a number in `[0, 1]` are
    /// logged and skipped. Returns how many values were accepted.
    pub async fn apply_updates(&self, mut lines: UnboundedReceiver<String>) -> u64 {
        let mut accepted = 0;
        while let Some(line) = lines.recv().await {
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            let result = input
                .parse::<f32>()
                .map_err(|_| {
                    StreamError::validation("conf", "must be a number in [0, 1]", input)
                })
                .and_then(|value| self.set_confidence(value));
            match result {
                Ok(()) => {
                    accepted += 1;
                    info!("Confidence threshold will change to {}", input);
                }
                Err(e) => warn!("Ignoring confidence input {:?}: {}", input, e),
            }
        }
        accepted
    }

    /// Value waiting for its timer, if any.
    pub fn pending_value(&self) -> Option<f32> {
        lock(&self.pending).value
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.pending).timer.is_some()
    }

    /// Successful pushes so far.
    pub fn pushes(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Wait for the armed timer (and its push) to finish.
    pub async fn flush(&self) {
        let timer = lock(&self.pending).timer.take();
        if let Some(timer) = timer {
            let _ = timer.await;
        }
    }
}

fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}
