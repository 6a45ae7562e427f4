//! Wait-handle flavored reactor.
//!
//! Hosts that block on OS handles (Windows event objects and the like) ask
//! for the device's handle and a timeout. A device that cannot offer a handle
//! is serviced by polling: the timeout is capped at
//! [`FALLBACK_POLL_INTERVAL`] while anything is pending and every timeout
//! counts as a readiness report.

use super::{min_wait, ReactorAdapter, WaitDescriptor, WaitHandle};
use crate::engine::{PortEngine, Readiness};
use crate::port::PortError;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Polling interval used when the device exposes no wait handle.
pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reactor for hosts that wait on opaque handles.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitHandleReactor;

impl WaitHandleReactor {
    pub fn new() -> Self {
        Self
    }

    fn wanted(engine: &PortEngine) -> Readiness {
        Readiness {
            readable: engine.wants_read(),
            writable: engine.wants_write(),
            hangup: false,
        }
    }
}

impl ReactorAdapter for WaitHandleReactor {
    type Source = WaitHandle;
    type Event = WaitHandle;

    fn describe_wait(&self, engine: &PortEngine) -> WaitDescriptor<WaitHandle> {
        let wanted = Self::wanted(engine);
        let timeout = engine.wait_timeout(Instant::now());
        if wanted == Readiness::default() {
            return WaitDescriptor {
                sources: Vec::new(),
                timeout,
            };
        }

        match engine.wait_handle() {
            Some(handle) => WaitDescriptor {
                sources: vec![handle],
                timeout,
            },
            None => WaitDescriptor {
                sources: Vec::new(),
                timeout: min_wait(timeout, Some(FALLBACK_POLL_INTERVAL)),
            },
        }
    }

    fn on_ready(&mut self, engine: &mut PortEngine, fired: &WaitHandle) {
        if engine.wait_handle() != Some(*fired) {
            return;
        }
        let wanted = Self::wanted(engine);
        trace!("Handle {:#x} signaled: {:?}", fired.as_raw(), wanted);
        engine.process(wanted);
    }

    fn on_timeout(&mut self, engine: &mut PortEngine) {
        if engine.wait_handle().is_none() {
            let wanted = Self::wanted(engine);
            if wanted != Readiness::default() {
                engine.process(wanted);
                return;
            }
        }
        engine.process_timeouts();
    }

    /// Without a handle-wait primitive of its own, this sleeps out the timeout
    /// and reports it. Hosts that own real handles call `on_ready` themselves.
    fn run_once(
        &mut self,
        engine: &mut PortEngine,
        max_wait: Option<Duration>,
    ) -> Result<(), PortError> {
        let wait = self.describe_wait(engine);
        let Some(timeout) = min_wait(wait.timeout, max_wait) else {
            return Ok(());
        };
        if !timeout.is_zero() {
            thread::sleep(timeout);
        }
        self.on_timeout(engine);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ReadCompletion, WriteCompletion};
    use crate::port::{default_config, MockDevice, MockHandle};
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log<T> = Arc<Mutex<Vec<T>>>;

    fn engine() -> (PortEngine, MockHandle, Log<WriteCompletion>, Log<ReadCompletion>) {
        let writes: Log<WriteCompletion> = Arc::default();
        let reads: Log<ReadCompletion> = Arc::default();
        let (w, r) = (Arc::clone(&writes), Arc::clone(&reads));
        let mut engine = PortEngine::new(move |c| w.lock().push(c), move |c| r.lock().push(c));

        let device = MockDevice::new("COM7");
        let handle = device.handle();
        engine
            .open_device(Box::new(device), &default_config().with_active(false))
            .unwrap();
        (engine, handle, writes, reads)
    }

    #[test]
    fn test_idle_engine_waits_on_nothing() {
        let (engine, handle, _, _) = engine();
        handle.set_wait_handle(Some(WaitHandle::from_raw(0x40)));

        let wait = WaitHandleReactor.describe_wait(&engine);
        assert!(wait.is_idle());
    }

    #[test]
    fn test_handle_offered_while_read_pending() {
        let (mut engine, handle, _, _) = engine();
        handle.set_wait_handle(Some(WaitHandle::from_raw(0x40)));
        engine.read(None);

        let wait = WaitHandleReactor.describe_wait(&engine);
        assert_eq!(wait.sources, vec![WaitHandle::from_raw(0x40)]);
        assert_eq!(wait.timeout, None);
    }

    #[test]
    fn test_missing_handle_falls_back_to_polling() {
        let (mut engine, _, _, _) = engine();
        engine.read(Some(Duration::from_secs(5)));

        let wait = WaitHandleReactor.describe_wait(&engine);
        assert!(wait.sources.is_empty());
        assert_eq!(wait.timeout, Some(FALLBACK_POLL_INTERVAL));
    }

    #[test]
    fn test_signaled_handle_completes_read() {
        let (mut engine, handle, _, reads) = engine();
        let raw = WaitHandle::from_raw(0x40);
        handle.set_wait_handle(Some(raw));
        engine.read(None);
        handle.enqueue_read(b"ok");

        WaitHandleReactor.on_ready(&mut engine, &WaitHandle::from_raw(0x41));
        assert!(reads.lock().is_empty());

        WaitHandleReactor.on_ready(&mut engine, &raw);
        assert_eq!(reads.lock()[0].as_ref().unwrap(), b"ok");
    }

    #[test]
    fn test_polling_fallback_drives_write() {
        let (mut engine, handle, writes, _) = engine();
        handle.set_write_capacity(Some(2));
        engine.write(b"abcd".to_vec(), None);
        assert!(writes.lock().is_empty());

        handle.grant_write_capacity(2);
        let mut reactor = WaitHandleReactor::new();
        reactor.run_once(&mut engine, None).unwrap();

        assert_eq!(*writes.lock()[0].result.as_ref().unwrap(), 4);
        assert_eq!(handle.written(), b"abcd");
    }

    #[test]
    fn test_run_once_returns_when_nothing_pending() {
        let (mut engine, _, _, _) = engine();
        let started = Instant::now();
        WaitHandleReactor.run_once(&mut engine, None).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
