//! Shared test utilities.
//!
//! - `Harness`: an engine whose callbacks record into shared logs
//! - mock-backed engine construction
//! - reactor driving with an iteration bound

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uart_engine::port::{default_config, MockDevice, MockHandle};
use uart_engine::{PortEngine, ReactorAdapter, ReadCompletion, UartConfig, WriteCompletion};

/// Everything the engine's callbacks delivered, in order.
#[derive(Clone, Default)]
pub struct Harness {
    pub writes: Arc<Mutex<Vec<WriteCompletion>>>,
    pub reads: Arc<Mutex<Vec<ReadCompletion>>>,
    pub notifications: Arc<Mutex<Vec<ReadCompletion>>>,
}

impl Harness {
    /// A closed engine wired to this harness.
    pub fn engine(&self) -> PortEngine {
        let writes = Arc::clone(&self.writes);
        let reads = Arc::clone(&self.reads);
        let notifications = Arc::clone(&self.notifications);
        PortEngine::new(
            move |c| writes.lock().push(c),
            move |c| reads.lock().push(c),
        )
        .with_notify(move |c| notifications.lock().push(c))
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().len()
    }

    /// All bytes delivered by successful reads, concatenated.
    pub fn received(&self) -> Vec<u8> {
        self.reads
            .lock()
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .flatten()
            .copied()
            .collect()
    }
}

/// Passive default settings: no unsolicited reads.
pub fn passive_config() -> UartConfig {
    default_config().with_active(false)
}

/// An engine already open on a fresh mock device.
pub fn open_mock(config: &UartConfig) -> (PortEngine, MockHandle, Harness) {
    let harness = Harness::default();
    let mut engine = harness.engine();
    let device = MockDevice::new("MOCK0");
    let handle = device.handle();
    engine
        .open_device(Box::new(device), config)
        .expect("mock open should succeed");
    (engine, handle, harness)
}

/// Run `reactor` until `done` holds or `limit` passes.
///
/// Returns whether `done` was reached.
pub fn drive_until<R: ReactorAdapter>(
    engine: &mut PortEngine,
    reactor: &mut R,
    limit: Duration,
    mut done: impl FnMut() -> bool,
) -> bool {
    let started = Instant::now();
    while !done() {
        if started.elapsed() > limit {
            return false;
        }
        reactor
            .run_once(engine, Some(Duration::from_millis(50)))
            .expect("reactor wait failed");
    }
    true
}
