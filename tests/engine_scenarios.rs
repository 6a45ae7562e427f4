//! End-to-end engine behaviour against scripted mock devices, driven through
//! the reactor adapters the way a host event loop would.

mod common;

use common::{drive_until, open_mock, passive_config, Harness};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use uart_engine::port::{default_config, MockDevice};
use uart_engine::reactor::{WaitHandleReactor, FALLBACK_POLL_INTERVAL};
use uart_engine::{PortError, ReactorAdapter, Transfer, WaitHandle};

#[test]
fn test_loopback_write_then_read() {
    let harness = Harness::default();
    let mut engine = harness.engine();
    engine
        .open_device(Box::new(MockDevice::loopback("LOOP0")), &passive_config())
        .unwrap();

    engine.write(b"ping".to_vec(), Some(Duration::from_secs(1)));
    engine.read(Some(Duration::from_secs(1)));

    assert_eq!(harness.write_count(), 1);
    assert_eq!(harness.received(), b"ping");
}

#[test]
fn test_throttled_write_is_drained_by_polling_fallback() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    handle.set_write_capacity(Some(16));

    engine.write(vec![0xA5; 256], None);
    assert_eq!(harness.write_count(), 0);

    let mut reactor = WaitHandleReactor::new();
    let limit = Duration::from_secs(2);
    let done = drive_until(&mut engine, &mut reactor, limit, || {
        handle.grant_write_capacity(16);
        harness.write_count() > 0
    });

    assert!(done);
    let writes = harness.writes.lock();
    assert_eq!(*writes[0].result.as_ref().unwrap(), 256);
    assert_eq!(handle.written().len(), 256);
}

#[test]
fn test_read_waits_for_late_data() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    let mut reactor = WaitHandleReactor::new();

    engine.read(None);
    reactor.run_once(&mut engine, None).unwrap();
    assert_eq!(harness.read_count(), 0);

    handle.enqueue_read(b"late arrival");
    let done = drive_until(&mut engine, &mut reactor, Duration::from_secs(1), || {
        harness.read_count() > 0
    });

    assert!(done);
    assert_eq!(harness.received(), b"late arrival");
}

#[test]
fn test_read_timeout_through_reactor() {
    let (mut engine, _handle, harness) = open_mock(&passive_config());
    let mut reactor = WaitHandleReactor::new();

    let started = Instant::now();
    engine.read(Some(Duration::from_millis(30)));
    let done = drive_until(&mut engine, &mut reactor, Duration::from_secs(1), || {
        harness.read_count() > 0
    });

    assert!(done);
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert!(harness.reads.lock()[0].as_ref().unwrap().is_empty());
}

#[test]
fn test_write_timeout_through_reactor() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    handle.set_write_capacity(Some(0));
    let mut reactor = WaitHandleReactor::new();

    engine.write(b"stuck".to_vec(), Some(Duration::from_millis(25)));
    let done = drive_until(&mut engine, &mut reactor, Duration::from_secs(1), || {
        harness.write_count() > 0
    });

    assert!(done);
    let writes = harness.writes.lock();
    assert!(matches!(writes[0].result, Err(PortError::Timeout(_))));
    assert_eq!(writes[0].data, b"stuck");
}

#[test]
fn test_reads_and_writes_proceed_independently() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    handle.set_write_capacity(Some(0));

    engine.write(b"blocked".to_vec(), None);
    engine.read(None);
    handle.enqueue_read(b"in");

    let mut reactor = WaitHandleReactor::new();
    reactor.run_once(&mut engine, None).unwrap();

    assert_eq!(harness.received(), b"in");
    assert_eq!(harness.write_count(), 0);
    assert!(engine.has_pending_write());

    engine.read(Some(Duration::ZERO));
    engine.write(b"again".to_vec(), None);
    assert!(matches!(
        harness.writes.lock()[0].result,
        Err(PortError::AlreadyPending(Transfer::Write))
    ));
}

#[test]
fn test_active_mode_streams_through_notify() {
    let (mut engine, handle, harness) = open_mock(&default_config());
    let mut reactor = WaitHandleReactor::new();

    let wait = reactor.describe_wait(&engine);
    assert_eq!(wait.timeout, Some(FALLBACK_POLL_INTERVAL));

    handle.enqueue_read(b"one");
    reactor.run_once(&mut engine, None).unwrap();
    handle.enqueue_read(b"two");
    reactor.run_once(&mut engine, None).unwrap();

    let notes = harness.notifications.lock();
    let chunks: Vec<&[u8]> = notes.iter().map(|n| n.as_ref().unwrap().as_slice()).collect();
    assert_eq!(chunks, vec![b"one".as_slice(), b"two".as_slice()]);
    assert_eq!(harness.read_count(), 0);
}

#[test]
fn test_signaled_handle_path() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    let event = WaitHandle::from_raw(0x1f0);
    handle.set_wait_handle(Some(event));
    let mut reactor = WaitHandleReactor::new();

    engine.read(None);
    let wait = reactor.describe_wait(&engine);
    assert_eq!(wait.sources, vec![event]);

    handle.enqueue_read(b"event");
    reactor.on_ready(&mut engine, &event);
    assert_eq!(harness.received(), b"event");
}

#[test]
fn test_close_during_traffic_cancels_everything() {
    let (mut engine, handle, harness) = open_mock(&passive_config());
    handle.set_write_capacity(Some(3));

    engine.write(b"partial".to_vec(), None);
    engine.read(None);
    engine.close().unwrap();

    assert!(matches!(harness.reads.lock()[0], Err(PortError::Cancelled)));
    let writes = harness.writes.lock();
    assert!(matches!(writes[0].result, Err(PortError::Cancelled)));
    assert_eq!(handle.written(), b"par");
    assert!(handle.is_released());
    assert!(WaitHandleReactor::new().describe_wait(&engine).is_idle());
}

#[test]
fn test_reopen_after_close() {
    let (mut engine, _first, harness) = open_mock(&passive_config());
    engine.close().unwrap();

    let device = MockDevice::loopback("LOOP1");
    engine.open_device(Box::new(device), &passive_config()).unwrap();
    assert_eq!(engine.name(), Some("LOOP1"));

    engine.write(b"x".to_vec(), None);
    engine.read(None);
    assert_eq!(harness.received(), b"x");
}

#[test]
fn test_error_codes_reach_last_error() {
    let harness = Harness::default();
    let mut engine = harness.engine();

    let missing = engine.open("/dev/definitely-not-a-uart", &passive_config());
    let err = missing.unwrap_err();
    assert_eq!(err.code(), PortError::not_found("x").code());
    assert!(engine.last_error().unwrap().contains("definitely-not-a-uart"));
}
