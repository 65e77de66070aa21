//! # WebSocket Connection
//!
//! Client side of the `/ws/detect` stream. The socket lives in a tokio task;
//! the session talks to it through an unbounded command channel and hears
//! back through its own event channel.
//!
//! ```text
//!               commands (Frame / Close)
//! Session ───────────────────────────────▶ ┌──────────────┐
//!                                          │  run_socket  │◀──▶ ws://…/ws/detect
//! Reactor ◀─────────────────────────────── └──────────────┘
//!        SessionEvent (Opened / Message / Closed / Error)
//! ```
//!
//! `ready_state` is an atomic shared with the task, so the pump can check it
//! without awaiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{StreamError, StreamResult};
use crate::session::{EventSender, SessionEvent};
use crate::transport::{Connection, ReadyState};

#[derive(Debug)]
enum Command {
    Frame(Vec<u8>),
    Close,
}

pub struct WsConnection {
    url: Url,
    state: Arc<AtomicU8>,
    commands: Option<UnboundedSender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl WsConnection {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            commands: None,
            task: None,
        }
    }

    /// Whether the I/O task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}

impl Connection for WsConnection {
    fn open(&mut self, events: EventSender) -> StreamResult<()> {
        if self.commands.is_some() {
            return Err(StreamError::state(
                format!("{:?}", self.ready_state()),
                "open",
                "connection already opened",
            ));
        }
        let handle = Handle::try_current().map_err(|e| {
            StreamError::connection(self.url.as_str(), format!("no tokio runtime: {e}"))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .store(ReadyState::Connecting as u8, Ordering::Release);
        self.commands = Some(tx);
        self.task = Some(handle.spawn(run_socket(
            self.url.to_string(),
            Arc::clone(&self.state),
            rx,
            events,
        )));
        debug!("Connecting to {}", self.url);
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&mut self, payload: Vec<u8>) -> StreamResult<()> {
        if !self.ready_state().is_open() {
            return Err(StreamError::send(format!(
                "connection is {:?}",
                self.ready_state()
            )));
        }
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| StreamError::send("connection was never opened"))?;
        commands
            .send(Command::Frame(payload))
            .map_err(|_| StreamError::send("socket task has exited"))
    }

    fn close(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close);
        }
        settle(&self.state, ReadyState::Closed);
        // The task finishes the close handshake on its own; it is detached.
        self.task = None;
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Move to a terminal state unless one was already reached.
fn settle(state: &AtomicU8, to: ReadyState) -> bool {
    let mut current = state.load(Ordering::Acquire);
    loop {
        if matches!(
            ReadyState::from_u8(current),
            ReadyState::Closed | ReadyState::Errored
        ) {
            return false;
        }
        match state.compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

async fn run_socket(
    url: String,
    state: Arc<AtomicU8>,
    mut commands: UnboundedReceiver<Command>,
    events: EventSender,
) {
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = commands.recv() => {
            debug!("Connection to {} closed before it opened", url);
            return;
        }
    };

    let (socket, _response) = match connected {
        Ok(pair) => pair,
        Err(e) => {
            if settle(&state, ReadyState::Errored) {
                warn!("WebSocket connect to {} failed: {}", url, e);
                let _ = events.send(SessionEvent::ConnectionError {
                    reason: e.to_string(),
                });
            }
            return;
        }
    };

    if state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        debug!("Connection to {} closed while opening", url);
        return;
    }
    info!("WebSocket connected to {}", url);
    let _ = events.send(SessionEvent::ConnectionOpened);

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Frame(payload)) => {
                    if let Err(e) = sink.send(Message::Binary(payload)).await {
                        if settle(&state, ReadyState::Errored) {
                            let _ = events.send(SessionEvent::ConnectionError {
                                reason: e.to_string(),
                            });
                        }
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Binary(payload))) => {
                    let _ = events.send(SessionEvent::Message {
                        payload,
                        received_at: Instant::now(),
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    if settle(&state, ReadyState::Closed) {
                        let _ = events.send(SessionEvent::ConnectionClosed {
                            reason: frame.map(|f| f.reason.to_string()),
                        });
                    }
                    break;
                }
                // Text, ping and pong frames carry nothing for the session.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if settle(&state, ReadyState::Errored) {
                        let _ = events.send(SessionEvent::ConnectionError {
                            reason: e.to_string(),
                        });
                    }
                    break;
                }
                None => {
                    if settle(&state, ReadyState::Closed) {
                        let _ = events.send(SessionEvent::ConnectionClosed { reason: None });
                    }
                    break;
                }
            },
        }
    }
    debug!("WebSocket task for {} finished", url);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("ws://127.0.0.1:9/ws/detect").unwrap()
    }

    #[test]
    fn test_send_before_open_fails() {
        let mut conn = WsConnection::new(url());
        assert_eq!(conn.ready_state(), ReadyState::Connecting);
        let err = conn.send(vec![1, 2, 3]).unwrap_err();
        assert_eq!(err.category(), "send");
    }

    #[test]
    fn test_open_without_runtime_is_connection_error() {
        let mut conn = WsConnection::new(url());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = conn.open(tx).unwrap_err();
        assert_eq!(err.category(), "connection");
    }

    #[test]
    fn test_close_is_idempotent_and_sticky() {
        let mut conn = WsConnection::new(url());
        conn.close();
        conn.close();
        assert_eq!(conn.ready_state(), ReadyState::Closed);
        assert!(!settle(&conn.state, ReadyState::Errored));
        assert_eq!(conn.ready_state(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn test_refused_connect_reports_error_event() {
        // Port 9 (discard) is closed on test hosts.
        let mut conn = WsConnection::new(url());
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.open(tx).unwrap();

        match rx.recv().await {
            Some(SessionEvent::ConnectionError { .. }) => {}
            other => panic!("expected connection error, got {other:?}"),
        }
        assert_eq!(conn.ready_state(), ReadyState::Errored);
    }
}
