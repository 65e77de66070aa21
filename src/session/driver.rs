//! Async driver for a started session.

use std::time::Duration;

use tracing::debug;

use crate::session::{Reactor, SessionStats, Step, TickOutcome};

/// Run the reactor until its session reaches a terminal state.
///
/// Yields to the runtime after every step. When the capture source has no
/// fresh frame, waits up to `idle_poll` for an external event before
/// ticking again; when nothing at all is queued, waits for the next event.
pub async fn drive(reactor: &mut Reactor, idle_poll: Duration) -> SessionStats {
    while !reactor.session().state().is_terminal() {
        match reactor.step() {
            Some(Step::Ticked(TickOutcome::NotReady)) => {
                reactor.wait_external(idle_poll).await;
            }
            Some(_) => tokio::task::yield_now().await,
            None => reactor.recv_external().await,
        }
    }

    let stats = reactor.session().stats();
    debug!("Driver finished in {:?}", reactor.session().state());
    stats
}
