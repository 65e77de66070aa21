//! # Live View
//!
//! Owner of the (at most one) running session, and of which view the user
//! is on. Leaving the live view stops the session, as does starting a new
//! one.

use tracing::debug;

use crate::error::{StreamError, StreamResult};
use crate::session::{Reactor, Session, SessionStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Live,
    Image,
    Video,
}

/// Builds a fresh session for each start.
pub trait SessionFactory {
    fn build(&mut self) -> StreamResult<Session>;
}

impl<F> SessionFactory for F
where
    F: FnMut() -> StreamResult<Session>,
{
    fn build(&mut self) -> StreamResult<Session> {
        self()
    }
}

pub struct LiveView<F: SessionFactory> {
    factory: F,
    view: View,
    active: Option<Reactor>,
}

impl<F: SessionFactory> LiveView<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            view: View::Live,
            active: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Tear down any running session, then build and start a new one.
    pub fn start(&mut self) -> StreamResult<&mut Reactor> {
        self.stop();
        if self.view != View::Live {
            return Err(StreamError::state(
                format!("{:?}", self.view),
                "start",
                "live sessions only run in the live view",
            ));
        }

        let mut reactor = Reactor::new(self.factory.build()?);
        reactor.start()?;
        Ok(self.active.insert(reactor))
    }

    /// Stop the running session, if any. Returns its final stats.
    pub fn stop(&mut self) -> Option<SessionStats> {
        let mut reactor = self.active.take()?;
        reactor.session_mut().stop();
        Some(reactor.session().stats())
    }

    /// Switch views. Leaving the live view stops the session.
    pub fn switch_view(&mut self, view: View) {
        if self.view == View::Live && view != View::Live {
            if let Some(stats) = self.stop() {
                debug!("Left live view after {} frames sent", stats.sent);
            }
        }
        self.view = view;
    }

    pub fn active(&self) -> Option<&Reactor> {
        self.active.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|reactor| reactor.session().state().is_live())
    }
}
