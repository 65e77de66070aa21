//! Integration tests for the frame pump: cadence, backpressure, send and
//! decode failures, rendering

mod common;

use common::mock_capture::ScriptedCapture;
use common::mock_connection::MockConnection;
use common::session_with;
use common::test_frames::jpeg;
use live_annotate::config::QualityConfig;
use live_annotate::render::MemorySurface;
use live_annotate::session::{Reactor, SessionState, Step, TickOutcome};
use live_annotate::transport::ReadyState;

fn started(reactor: &mut Reactor) {
    reactor.start().unwrap();
    // Handle ConnectionOpened.
    assert_eq!(reactor.step(), Some(Step::Handled));
    assert_eq!(reactor.session().state(), SessionState::Active);
}

/// Tick outcomes in order, without the idle polls after the source ran dry.
fn ready_ticks(steps: &[Step]) -> Vec<TickOutcome> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Ticked(TickOutcome::NotReady) => None,
            Step::Ticked(outcome) => Some(*outcome),
            Step::Handled => None,
        })
        .collect()
}

#[test]
fn test_every_fourth_frame_sent() {
    let connection = MockConnection::echo(jpeg(32, 24));
    let conn_log = connection.log();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::new(640, 0.7, 4),
        ScriptedCapture::with_frames(64, 48, 10),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);

    let ticks = ready_ticks(&reactor.run_until_idle(100));
    assert_eq!(ticks.len(), 10);

    let sent_on: Vec<usize> = ticks
        .iter()
        .enumerate()
        .filter(|(_, outcome)| matches!(outcome, TickOutcome::Sent { .. }))
        .map(|(i, _)| i + 1)
        .collect();
    assert_eq!(sent_on, vec![4, 8]);
    assert!(
        ticks
            .iter()
            .filter(|outcome| !matches!(outcome, TickOutcome::Sent { .. }))
            .all(|outcome| *outcome == TickOutcome::Skipped)
    );

    let stats = reactor.session().stats();
    assert_eq!(stats.captured, 10);
    assert_eq!(stats.skipped, 8);
    assert_eq!(stats.sent, 2);
    assert_eq!(conn_log.sent_count(), 2);
    assert_eq!(reactor.session().frame_counter(), 10);
}

#[test]
fn test_strict_alternation_with_prompt_replies() {
    let connection = MockConnection::echo(jpeg(32, 24));
    let mut reactor = Reactor::new(session_with(
        QualityConfig::new(640, 0.7, 1),
        ScriptedCapture::with_frames(64, 48, 6),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);

    let pattern: Vec<&str> = reactor
        .run_until_idle(100)
        .iter()
        .filter_map(|step| match step {
            Step::Ticked(TickOutcome::Sent { .. }) => Some("send"),
            Step::Handled => Some("recv"),
            Step::Ticked(TickOutcome::NotReady) => None,
            Step::Ticked(other) => panic!("unexpected outcome {other:?}"),
        })
        .collect();

    assert_eq!(pattern.len(), 12);
    for pair in pattern.chunks(2) {
        assert_eq!(pair, ["send", "recv"]);
    }
    assert_eq!(reactor.session().stats().received, 6);
}

#[test]
fn test_at_most_one_frame_in_flight() {
    let connection = MockConnection::auto_open();
    let conn_log = connection.log();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::default(),
        ScriptedCapture::endless(64, 48),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);

    // No reply, so the pump goes quiet after the first send.
    let steps = reactor.run_until_idle(10);
    assert_eq!(steps.len(), 1);
    assert!(matches!(steps[0], Step::Ticked(TickOutcome::Sent { .. })));

    let session = reactor.session_mut();
    for _ in 0..50 {
        assert_eq!(session.tick(), TickOutcome::Backpressured);
    }
    assert_eq!(conn_log.sent_count(), 1);
    assert!(session.in_flight());

    // The reply re-arms the pump.
    conn_log.reply(jpeg(32, 24));
    let steps = reactor.run_until_idle(2);
    assert_eq!(steps[0], Step::Handled);
    assert!(matches!(steps[1], Step::Ticked(TickOutcome::Sent { .. })));
    assert_eq!(conn_log.sent_count(), 2);
}

#[test]
fn test_refused_send_clears_in_flight() {
    let connection = MockConnection::refusing();
    let conn_log = connection.log();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::default(),
        ScriptedCapture::endless(64, 48),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);

    let steps = reactor.run_until_idle(5);
    assert!(
        steps
            .iter()
            .all(|step| *step == Step::Ticked(TickOutcome::SendFailed))
    );
    assert!(!reactor.session().in_flight());
    assert_eq!(reactor.session().stats().send_failures, 5);
    assert_eq!(conn_log.sent_count(), 0);
    assert_eq!(reactor.session().state(), SessionState::Active);
    // Per-frame failures are not session failures.
    assert_eq!(reactor.session().last_error(), None);
}

#[test]
fn test_send_while_connection_not_open_is_a_skip() {
    let connection = MockConnection::auto_open();
    let conn_log = connection.log();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::default(),
        ScriptedCapture::endless(64, 48),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);

    conn_log.set_state(ReadyState::Connecting);
    let session = reactor.session_mut();
    assert_eq!(session.tick(), TickOutcome::SendFailed);
    assert!(!session.in_flight());

    conn_log.set_state(ReadyState::Open);
    assert!(matches!(session.tick(), TickOutcome::Sent { .. }));
}

#[test]
fn test_undecodable_reply_keeps_pumping() {
    let connection = MockConnection::echo(b"not a jpeg".to_vec());
    let conn_log = connection.log();
    let surface = MemorySurface::new();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::default(),
        ScriptedCapture::with_frames(64, 48, 3),
        connection,
        surface.clone(),
    ));
    started(&mut reactor);

    reactor.run_until_idle(20);

    let session = reactor.session();
    assert_eq!(conn_log.sent_count(), 3);
    assert_eq!(session.stats().decode_failures, 3);
    assert!(!session.in_flight());
    assert_eq!(session.smoothed_fps(), None);
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.last_error(), None);
    assert_eq!(surface.snapshot().draws, 0);
}

#[test]
fn test_surface_takes_reply_dimensions() {
    let connection = MockConnection::echo(jpeg(48, 32));
    let surface = MemorySurface::new();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::default(),
        ScriptedCapture::with_frames(200, 100, 3),
        connection,
        surface.clone(),
    ));
    started(&mut reactor);

    reactor.run_until_idle(20);

    let snap = surface.snapshot();
    assert_eq!(snap.size, Some((48, 32)));
    assert_eq!(snap.draws, 3);
    assert_eq!(snap.frame.map(|f| f.dimensions()), Some((48, 32)));
    assert!(!snap.placeholder);
}

#[test]
fn test_encode_never_upscales() {
    for (input, max_width, expected) in [
        ((200, 100), 640, (200, 100)),
        ((1280, 720), 320, (320, 180)),
        ((640, 480), 640, (640, 480)),
        ((1920, 1080), 1280, (1280, 720)),
    ] {
        let mut reactor = Reactor::new(session_with(
            QualityConfig::new(max_width, 0.7, 1),
            ScriptedCapture::endless(input.0, input.1),
            MockConnection::auto_open(),
            MemorySurface::new(),
        ));
        started(&mut reactor);

        match reactor.session_mut().tick() {
            TickOutcome::Sent { width, height, .. } => {
                assert_eq!((width, height), expected, "input {input:?} max {max_width}");
                assert!(width <= input.0.min(max_width));
            }
            other => panic!("expected a send, got {other:?}"),
        }
    }
}

#[test]
fn test_sent_payload_is_jpeg() {
    let connection = MockConnection::auto_open();
    let conn_log = connection.log();
    let mut reactor = Reactor::new(session_with(
        QualityConfig::new(320, 0.5, 1),
        ScriptedCapture::endless(640, 480),
        connection,
        MemorySurface::new(),
    ));
    started(&mut reactor);
    reactor.session_mut().tick();

    let sent = conn_log.sent();
    let decoded = image::load_from_memory(&sent[0]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
}
