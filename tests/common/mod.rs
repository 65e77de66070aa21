//! Common test utilities and helpers for the live-annotate tests
//!
//! Mock capture sources, connections and confidence sinks that record what
//! the session does to them, plus frame and JPEG fixtures.

#![allow(dead_code)]

use live_annotate::config::QualityConfig;
use live_annotate::render::MemorySurface;
use live_annotate::session::Session;

use mock_capture::ScriptedCapture;
use mock_connection::MockConnection;

/// Build a session around mocks with the given quality settings.
pub fn session_with(
    quality: QualityConfig,
    capture: ScriptedCapture,
    connection: MockConnection,
    surface: MemorySurface,
) -> Session {
    Session::new(
        quality,
        Box::new(capture),
        Box::new(connection),
        Box::new(surface),
    )
    .expect("valid quality config")
}

/// Mock capture source with a scripted number of ready frames
pub mod mock_capture {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use frame_scale::plan::Size;
    use live_annotate::StreamError;
    use live_annotate::StreamResult;
    use live_annotate::capture::CaptureSource;
    use live_annotate::core::Frame;

    use super::test_frames::solid_rgba;

    /// What happened to a capture source, shared with the test.
    #[derive(Debug, Default)]
    pub struct CaptureLog {
        acquires: AtomicU32,
        release_calls: AtomicU32,
        active: AtomicBool,
    }

    impl CaptureLog {
        pub fn acquires(&self) -> u32 {
            self.acquires.load(Ordering::SeqCst)
        }

        pub fn release_calls(&self) -> u32 {
            self.release_calls.load(Ordering::SeqCst)
        }

        /// Acquired and not yet released.
        pub fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    pub struct ScriptedCapture {
        size: Size,
        remaining: Option<u64>,
        fail_acquire: bool,
        acquired: bool,
        sequence: u64,
        log: Arc<CaptureLog>,
    }

    impl ScriptedCapture {
        /// A source that always has a fresh frame.
        pub fn endless(width: u32, height: u32) -> Self {
            Self {
                size: Size {
                    w: width,
                    h: height,
                },
                remaining: None,
                fail_acquire: false,
                acquired: false,
                sequence: 0,
                log: Arc::new(CaptureLog::default()),
            }
        }

        /// A source with exactly `frames` ready frames, then nothing.
        pub fn with_frames(width: u32, height: u32, frames: u64) -> Self {
            Self {
                remaining: Some(frames),
                ..Self::endless(width, height)
            }
        }

        /// A source whose device cannot be acquired.
        pub fn failing() -> Self {
            Self {
                fail_acquire: true,
                ..Self::endless(16, 16)
            }
        }

        pub fn log(&self) -> Arc<CaptureLog> {
            Arc::clone(&self.log)
        }
    }

    impl CaptureSource for ScriptedCapture {
        fn acquire(&mut self) -> StreamResult<()> {
            if self.fail_acquire {
                return Err(StreamError::acquisition("scripted", "permission denied"));
            }
            self.acquired = true;
            self.log.acquires.fetch_add(1, Ordering::SeqCst);
            self.log.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn frame_ready(&self) -> bool {
            self.acquired && self.remaining != Some(0)
        }

        fn current_frame(&mut self) -> Option<Frame> {
            if !self.frame_ready() {
                return None;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            let frame = solid_rgba(self.size.w, self.size.h, self.sequence);
            self.sequence += 1;
            Some(frame)
        }

        fn release(&mut self) {
            self.log.release_calls.fetch_add(1, Ordering::SeqCst);
            self.acquired = false;
            self.log.active.store(false, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            format!("scripted:{}x{}", self.size.w, self.size.h)
        }
    }
}

/// Mock connection that records sends and can answer them
pub mod mock_connection {
    use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use live_annotate::StreamError;
    use live_annotate::StreamResult;
    use live_annotate::session::{EventSender, SessionEvent};
    use live_annotate::transport::{Connection, ReadyState};

    /// What happened to a connection, shared with the test.
    #[derive(Debug)]
    pub struct ConnectionLog {
        state: AtomicU8,
        opens: AtomicU32,
        close_calls: AtomicU32,
        sent: Mutex<Vec<Vec<u8>>>,
        events: Mutex<Option<EventSender>>,
    }

    impl Default for ConnectionLog {
        fn default() -> Self {
            Self {
                state: AtomicU8::new(ReadyState::Connecting as u8),
                opens: AtomicU32::new(0),
                close_calls: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
                events: Mutex::new(None),
            }
        }
    }

    impl ConnectionLog {
        pub fn opens(&self) -> u32 {
            self.opens.load(Ordering::SeqCst)
        }

        pub fn close_calls(&self) -> u32 {
            self.close_calls.load(Ordering::SeqCst)
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        pub fn state(&self) -> ReadyState {
            ReadyState::from_u8(self.state.load(Ordering::SeqCst))
        }

        pub fn set_state(&self, state: ReadyState) {
            self.state.store(state as u8, Ordering::SeqCst);
        }

        /// Post an event as if the I/O task had observed it.
        pub fn post(&self, event: SessionEvent) {
            let events = self.events.lock().unwrap();
            events
                .as_ref()
                .expect("connection was opened")
                .send(event)
                .expect("reactor alive");
        }

        /// Mark open and announce it.
        pub fn open_now(&self) {
            self.set_state(ReadyState::Open);
            self.post(SessionEvent::ConnectionOpened);
        }

        pub fn reply(&self, payload: Vec<u8>) {
            self.post(SessionEvent::Message {
                payload,
                received_at: Instant::now(),
            });
        }
    }

    pub struct MockConnection {
        log: Arc<ConnectionLog>,
        open_immediately: bool,
        echo: Option<Vec<u8>>,
        refuse_sends: bool,
    }

    impl MockConnection {
        /// Stays Connecting until the test calls `log.open_now()`.
        pub fn manual() -> Self {
            Self {
                log: Arc::new(ConnectionLog::default()),
                open_immediately: false,
                echo: None,
                refuse_sends: false,
            }
        }

        /// Opens as soon as `open` is called.
        pub fn auto_open() -> Self {
            Self {
                open_immediately: true,
                ..Self::manual()
            }
        }

        /// Opens immediately and answers every frame with `reply`.
        pub fn echo(reply: Vec<u8>) -> Self {
            Self {
                echo: Some(reply),
                ..Self::auto_open()
            }
        }

        /// Opens immediately but rejects every send.
        pub fn refusing() -> Self {
            Self {
                refuse_sends: true,
                ..Self::auto_open()
            }
        }

        pub fn log(&self) -> Arc<ConnectionLog> {
            Arc::clone(&self.log)
        }
    }

    impl Connection for MockConnection {
        fn open(&mut self, events: EventSender) -> StreamResult<()> {
            self.log.opens.fetch_add(1, Ordering::SeqCst);
            *self.log.events.lock().unwrap() = Some(events);
            if self.open_immediately {
                self.log.open_now();
            }
            Ok(())
        }

        fn ready_state(&self) -> ReadyState {
            self.log.state()
        }

        fn send(&mut self, payload: Vec<u8>) -> StreamResult<()> {
            if !self.log.state().is_open() {
                return Err(StreamError::send("not open"));
            }
            if self.refuse_sends {
                return Err(StreamError::send("buffer full"));
            }
            self.log.sent.lock().unwrap().push(payload);
            if let Some(reply) = &self.echo {
                self.log.reply(reply.clone());
            }
            Ok(())
        }

        fn close(&mut self) {
            self.log.close_calls.fetch_add(1, Ordering::SeqCst);
            self.log.set_state(ReadyState::Closed);
        }

        fn endpoint(&self) -> String {
            "mock://detect".to_string()
        }
    }
}

/// Confidence sink that records pushes
pub mod mock_sink {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use live_annotate::confidence::ConfidenceSink;
    use tokio::time::Instant;

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pushes: Mutex<Vec<(f32, Instant)>>,
        fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn values(&self) -> Vec<f32> {
            self.pushes.lock().unwrap().iter().map(|(v, _)| *v).collect()
        }

        pub fn times(&self) -> Vec<Instant> {
            self.pushes.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }

        pub fn attempts(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ConfidenceSink for RecordingSink {
        async fn push_confidence(&self, conf: f32) -> anyhow::Result<()> {
            self.pushes.lock().unwrap().push((conf, Instant::now()));
            if self.fail {
                anyhow::bail!("service unavailable");
            }
            Ok(())
        }
    }
}

/// Test frame utilities
pub mod test_frames {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use live_annotate::core::Frame;

    /// Solid RGBA frame.
    pub fn solid_rgba(width: u32, height: u32, sequence: u64) -> Frame {
        let data = [30u8, 120, 200, 255].repeat((width * height) as usize);
        Frame::from_rgba(width, height, data, sequence).expect("length matches")
    }

    /// A small JPEG standing in for an annotated reply.
    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let rgb = vec![90u8; (width * height * 3) as usize];
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 80)
            .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
            .expect("encode fixture");
        out
    }
}
