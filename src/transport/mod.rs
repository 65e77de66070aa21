//! # Transport Module
//!
//! The duplex channel between a session and the annotation service.
//!
//! ```text
//! ┌─────────────┐  send(jpeg)   ┌──────────────┐   binary    ┌─────────┐
//! │   Session   │──────────────▶│  Connection  │────────────▶│ Service │
//! │             │◀──────────────│  (I/O task)  │◀────────────│         │
//! └─────────────┘ SessionEvent  └──────────────┘   binary    └─────────┘
//! ```
//!
//! A connection never calls back into the session. Everything it observes
//! (open, message, close, error) is posted to the session's event channel
//! and handled in order by the reactor.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket client on tokio-tungstenite |

pub mod websocket;

pub use websocket::WsConnection;

use crate::error::StreamResult;
use crate::session::EventSender;

/// Connection readiness as seen by the frame pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
    Errored = 3,
}

impl ReadyState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closed,
            _ => ReadyState::Errored,
        }
    }

    pub fn is_open(self) -> bool {
        self == ReadyState::Open
    }
}

/// Non-blocking duplex channel carrying opaque binary messages.
pub trait Connection: Send {
    /// Begin connecting. Progress is reported through `events`.
    fn open(&mut self, events: EventSender) -> StreamResult<()>;

    fn ready_state(&self) -> ReadyState;

    /// Queue one binary message. Fails immediately when not open.
    fn send(&mut self, payload: Vec<u8>) -> StreamResult<()>;

    /// Close the channel. Must be safe to call more than once.
    fn close(&mut self);

    /// Where this connection points, for logs.
    fn endpoint(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_round_trips_through_u8() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closed,
            ReadyState::Errored,
        ] {
            assert_eq!(ReadyState::from_u8(state as u8), state);
        }
        assert!(ReadyState::Open.is_open());
        assert!(!ReadyState::Connecting.is_open());
    }
}
