//! Glue between a [`PortEngine`] and a host event loop.
//!
//! The engine never blocks and never waits on its own. An event loop asks a
//! [`ReactorAdapter`] what to wait on, waits, and hands back whatever fired.
//! Two adapters ship with the crate:
//!
//! - [`PollReactor`] (unix): the device's file descriptor in a `pollfd` set.
//! - [`WaitHandleReactor`]: an opaque wait handle, or a short polling
//!   interval when the device has no handle to offer.
//!
//! [`PlatformReactor`] names whichever of the two fits the build target.

#[cfg(unix)]
pub mod poll;
pub mod wait_handle;

#[cfg(unix)]
pub use poll::{add_poll_events, PollReactor};
pub use wait_handle::{WaitHandleReactor, FALLBACK_POLL_INTERVAL};

use crate::engine::PortEngine;
use crate::port::PortError;
use std::time::Duration;

/// Reactor used by default on this platform.
#[cfg(unix)]
pub type PlatformReactor = PollReactor;
#[cfg(not(unix))]
pub type PlatformReactor = WaitHandleReactor;

/// Opaque OS object a host loop can block on until a device needs service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitHandle(isize);

impl WaitHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> isize {
        self.0
    }
}

#[cfg(windows)]
impl From<std::os::windows::io::RawHandle> for WaitHandle {
    fn from(handle: std::os::windows::io::RawHandle) -> Self {
        Self(handle as isize)
    }
}

/// What an engine needs its event loop to wait on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitDescriptor<S> {
    pub sources: Vec<S>,
    /// Longest the loop may block; `None` is indefinitely.
    pub timeout: Option<Duration>,
}

impl<S> WaitDescriptor<S> {
    /// Nothing to watch and no deadline.
    pub fn idle() -> Self {
        Self {
            sources: Vec::new(),
            timeout: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.sources.is_empty() && self.timeout.is_none()
    }
}

/// Translates between one host event-loop flavor and a [`PortEngine`].
pub trait ReactorAdapter {
    /// Something the loop waits on.
    type Source;
    /// What the loop reports back when a source fires.
    type Event;

    /// Wait sources and timeout for the engine's current state.
    ///
    /// Must be asked again after every callback or request, since both
    /// change what the engine is interested in.
    fn describe_wait(&self, engine: &PortEngine) -> WaitDescriptor<Self::Source>;

    /// A source fired. Events that do not belong to this engine are ignored.
    fn on_ready(&mut self, engine: &mut PortEngine, fired: &Self::Event);

    /// The loop's timeout elapsed with nothing firing.
    fn on_timeout(&mut self, engine: &mut PortEngine);

    /// Wait once, capped at `max_wait`, and dispatch the result.
    ///
    /// Returns immediately when the engine has nothing to wait for.
    fn run_once(
        &mut self,
        engine: &mut PortEngine,
        max_wait: Option<Duration>,
    ) -> Result<(), PortError>;
}

/// The shorter of two optional waits, `None` being unbounded.
pub(crate) fn min_wait(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
