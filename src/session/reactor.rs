//! # Session Reactor
//!
//! Explicit event queue in front of a `Session`.
//!
//! ```text
//!  connection task ──┐
//!  ctrl-c / timers ──┼──▶ mpsc ──▶ ┌──────────────────────┐
//!                    │             │ queue: VecDeque<Ev>  │──▶ Session::handle
//!  Session (Tick) ───┴───────────▶ │ (at most one Tick)   │    Session::tick
//!                                  └──────────────────────┘
//! ```
//!
//! External events are drained into the local queue at the start of every
//! step, so they interleave with ticks in arrival order. A tick that asks to
//! be rescheduled goes to the back of the queue; at most one tick is ever
//! queued.
//!
//! `step` is synchronous and deterministic, which is what the tests drive.
//! `crate::session::drive` wraps it in an async loop for real runs.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::error::StreamResult;
use crate::session::{Control, EventSender, Session, SessionEvent, TickOutcome};

/// What one `step` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ticked(TickOutcome),
    Handled,
}

pub struct Reactor {
    session: Session,
    queue: VecDeque<SessionEvent>,
    tick_queued: bool,
    tx: EventSender,
    rx: UnboundedReceiver<SessionEvent>,
}

impl Reactor {
    pub fn new(session: Session) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session,
            queue: VecDeque::new(),
            tick_queued: false,
            tx,
            rx,
        }
    }

    /// Handle for posting events from other tasks.
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Start the session with this reactor as its event sink.
    pub fn start(&mut self) -> StreamResult<()> {
        self.session.start(self.tx.clone())
    }

    /// Queue an event.
    pub fn dispatch(&mut self, event: SessionEvent) {
        if matches!(event, SessionEvent::Tick) {
            self.schedule_tick();
        } else {
            self.queue.push_back(event);
        }
    }

    /// Process the next queued event. `None` when nothing is pending.
    pub fn step(&mut self) -> Option<Step> {
        self.drain_external();
        let event = self.queue.pop_front()?;

        if let SessionEvent::Tick = event {
            self.tick_queued = false;
            let outcome = self.session.tick();
            if outcome.reschedules() {
                self.schedule_tick();
            }
            return Some(Step::Ticked(outcome));
        }

        if self.session.handle(event) == Control::Reschedule {
            self.schedule_tick();
        }
        Some(Step::Handled)
    }

    /// Step until nothing is pending or `max_steps` have run. Returns the
    /// steps taken in order.
    pub fn run_until_idle(&mut self, max_steps: usize) -> Vec<Step> {
        let mut steps = Vec::new();
        while steps.len() < max_steps {
            match self.step() {
                Some(step) => steps.push(step),
                None => break,
            }
        }
        steps
    }

    /// Wait up to `timeout` for an external event. Returns whether one
    /// arrived.
    pub async fn wait_external(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => {
                self.dispatch(event);
                true
            }
            _ => false,
        }
    }

    /// Wait for the next external event.
    pub async fn recv_external(&mut self) {
        // `self.tx` keeps the channel open, so `recv` only yields events.
        if let Some(event) = self.rx.recv().await {
            self.dispatch(event);
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    fn schedule_tick(&mut self) {
        if !self.tick_queued {
            self.tick_queued = true;
            self.queue.push_back(SessionEvent::Tick);
        }
    }

    fn drain_external(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(event);
        }
    }
}
