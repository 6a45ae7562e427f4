//! `poll(2)` flavored reactor.

use super::{min_wait, ReactorAdapter, WaitDescriptor};
use crate::engine::{PortEngine, Readiness};
use crate::port::PortError;
use std::io;
use std::time::{Duration, Instant};
use tracing::trace;

/// Reactor for hosts that multiplex descriptors with `poll(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollReactor;

impl PollReactor {
    pub fn new() -> Self {
        Self
    }
}

/// Milliseconds for `poll(2)`, rounded up, `-1` meaning infinite.
fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(t) => i32::try_from(t.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX),
    }
}

/// Merge two `poll(2)` timeouts, keeping the shorter.
fn merge_millis(current: i32, ours: i32) -> i32 {
    match (current < 0, ours < 0) {
        (true, _) => ours,
        (false, true) => current,
        (false, false) => current.min(ours),
    }
}

/// Append the engine's poll entries to a caller-owned set.
///
/// Writes at most `fds.len()` entries and returns how many were written.
/// `timeout_ms` is lowered to the engine's next deadline if that is sooner;
/// `-1` stands for infinite on both sides.
pub fn add_poll_events(engine: &PortEngine, fds: &mut [libc::pollfd], timeout_ms: &mut i32) -> usize {
    let wait = PollReactor.describe_wait(engine);
    *timeout_ms = merge_millis(*timeout_ms, timeout_millis(wait.timeout));

    let count = wait.sources.len().min(fds.len());
    fds[..count].copy_from_slice(&wait.sources[..count]);
    count
}

impl ReactorAdapter for PollReactor {
    type Source = libc::pollfd;
    type Event = libc::pollfd;

    fn describe_wait(&self, engine: &PortEngine) -> WaitDescriptor<libc::pollfd> {
        let mut events = 0;
        if engine.wants_read() {
            events |= libc::POLLIN;
        }
        if engine.wants_write() {
            events |= libc::POLLOUT;
        }

        let sources = match engine.poll_fd() {
            Some(fd) if events != 0 => vec![libc::pollfd {
                fd,
                events,
                revents: 0,
            }],
            _ => Vec::new(),
        };

        WaitDescriptor {
            sources,
            timeout: engine.wait_timeout(Instant::now()),
        }
    }

    fn on_ready(&mut self, engine: &mut PortEngine, fired: &libc::pollfd) {
        if engine.poll_fd() != Some(fired.fd) {
            return;
        }
        let ready = Readiness {
            readable: fired.revents & libc::POLLIN != 0,
            writable: fired.revents & libc::POLLOUT != 0,
            hangup: fired.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0,
        };
        if ready == Readiness::default() {
            return;
        }
        trace!("fd {} ready: {:?}", fired.fd, ready);
        engine.process(ready);
    }

    fn on_timeout(&mut self, engine: &mut PortEngine) {
        engine.process_timeouts();
    }

    fn run_once(
        &mut self,
        engine: &mut PortEngine,
        max_wait: Option<Duration>,
    ) -> Result<(), PortError> {
        let wait = self.describe_wait(engine);
        let timeout = min_wait(wait.timeout, max_wait);
        let mut fds = wait.sources;
        if fds.is_empty() && timeout.is_none() {
            return Ok(());
        }

        // SAFETY: `fds` is a live, exclusively borrowed buffer of
        // `fds.len()` initialized entries for the whole call.
        let rc = unsafe {
            libc::poll(
                fds.as_mut_ptr(),
                fds.len() as libc::nfds_t,
                timeout_millis(timeout),
            )
        };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err.into());
        }
        if rc == 0 {
            self.on_timeout(engine);
            return Ok(());
        }
        for fired in fds.iter().filter(|p| p.revents != 0) {
            self.on_ready(engine, fired);
        }
        Ok(())
    }
}
