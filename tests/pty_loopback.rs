//! Round trips through a Linux pseudo-terminal, with the engine on the slave
//! side and the real `poll(2)` reactor doing the waiting.

#![cfg(target_os = "linux")]

mod common;

use common::{drive_until, passive_config, Harness};
use serialport::{SerialPort, TTYPort};
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use uart_engine::port::NativeDevice;
use uart_engine::reactor::{add_poll_events, PollReactor};
use uart_engine::{PortEngine, PortError};

const LIMIT: Duration = Duration::from_secs(5);

fn engine_on_pty() -> (PortEngine, TTYPort, Harness) {
    let (mut master, slave) = TTYPort::pair().expect("failed to allocate a pty pair");
    master
        .set_timeout(Duration::from_secs(2))
        .expect("failed to set master timeout");

    let name = slave.name().unwrap_or_else(|| "pty".to_string());
    let device = NativeDevice::from_native(slave, name).expect("failed to wrap pty slave");

    let harness = Harness::default();
    let mut engine = harness.engine();
    engine
        .open_device(Box::new(device), &passive_config())
        .expect("failed to configure pty slave");
    (engine, master, harness)
}

#[test]
fn test_write_reaches_master() {
    let (mut engine, mut master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();

    engine.write(b"hello pty".to_vec(), Some(Duration::from_secs(1)));
    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.write_count() > 0
    }));
    assert_eq!(
        *harness.writes.lock()[0].result.as_ref().unwrap(),
        b"hello pty".len()
    );

    let mut buffer = [0u8; 9];
    master.read_exact(&mut buffer).unwrap();
    assert_eq!(&buffer, b"hello pty");
}

#[test]
fn test_read_wakes_on_master_data() {
    let (mut engine, mut master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();

    engine.read(None);
    let fd = engine.poll_fd().expect("native device has a descriptor");
    let mut fds = [libc::pollfd {
        fd: -1,
        events: 0,
        revents: 0,
    }; 1];
    let mut timeout = -1;
    assert_eq!(add_poll_events(&engine, &mut fds, &mut timeout), 1);
    assert_eq!(fds[0].fd, fd);
    assert_eq!(fds[0].events, libc::POLLIN);
    assert_eq!(timeout, -1);

    master.write_all(b"from master").unwrap();
    master.flush().unwrap();

    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.read_count() > 0
    }));
    // The first completion may carry only part of what was sent.
    while harness.received().len() < b"from master".len() {
        let before = harness.read_count();
        engine.read(Some(Duration::from_millis(500)));
        assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
            harness.read_count() > before
        }));
    }
    assert_eq!(harness.received(), b"from master");
}

/// More than a pty will buffer with nobody reading the master.
const BACKLOG: usize = 1 << 20;

#[test]
fn test_large_write_stays_pending_until_master_reads() {
    let (mut engine, mut master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();
    let payload: Vec<u8> = (0..BACKLOG).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    engine.write(payload, None);
    assert!(engine.has_pending_write());
    assert_eq!(harness.write_count(), 0);

    let reader = thread::spawn(move || {
        let mut received = Vec::with_capacity(expected.len());
        let mut chunk = [0u8; 4096];
        while received.len() < expected.len() {
            match master.read(&mut chunk) {
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(_) => break,
            }
        }
        received == expected
    });

    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.write_count() > 0
    }));
    assert_eq!(*harness.writes.lock()[0].result.as_ref().unwrap(), BACKLOG);
    assert!(reader.join().unwrap(), "master saw corrupted data");
}

#[test]
fn test_write_without_reader_returns_and_times_out() {
    let (mut engine, _master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();

    let started = Instant::now();
    engine.write(vec![0u8; BACKLOG], Some(Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(engine.has_pending_write());

    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.write_count() > 0
    }));
    let writes = harness.writes.lock();
    assert!(matches!(writes[0].result, Err(PortError::Timeout(_))));
    assert_eq!(writes[0].data.len(), BACKLOG);
}

#[test]
fn test_read_timeout_with_silent_master() {
    let (mut engine, _master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();

    engine.read(Some(Duration::from_millis(50)));
    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.read_count() > 0
    }));
    assert!(harness.reads.lock()[0].as_ref().unwrap().is_empty());
}

#[test]
fn test_master_hangup_fails_read() {
    let (mut engine, master, harness) = engine_on_pty();
    let mut reactor = PollReactor::new();
    drop(master);

    engine.read(None);
    assert!(drive_until(&mut engine, &mut reactor, LIMIT, || {
        harness.read_count() > 0
    }));
    assert!(matches!(harness.reads.lock()[0], Err(PortError::Io(_))));
}
