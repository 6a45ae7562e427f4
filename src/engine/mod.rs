//! The per-port asynchronous I/O engine.
//!
//! A [`PortEngine`] owns one serial device and at most one in-flight read and
//! one in-flight write. `read` and `write` never block: they try the transfer
//! once and, if it cannot finish yet, park it until a reactor reports the
//! device ready (see [`crate::reactor`]). Every accepted request ends in
//! exactly one call of the matching completion callback.
//!
//! ```text
//! caller ── write/read ──> PortEngine ──try──> SerialDevice
//!                              ▲   │
//!      ReactorAdapter ─process─┘   └─ callback (exactly once per request)
//! ```

mod pending;

pub use pending::READ_CAPACITY;

use crate::error::ErrorReporter;
use crate::port::{
    Direction, NativeDevice, PortError, SerialDevice, Signals, Transfer, UartConfig,
};
use crate::reactor::WaitHandle;
use pending::{PendingRead, PendingWrite};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Outcome of a write request.
///
/// The buffer handed to [`PortEngine::write`] comes back here whatever the
/// result, so the caller can reuse or release it.
#[derive(Debug)]
pub struct WriteCompletion {
    /// Number of bytes written (always the full buffer) or the failure.
    pub result: Result<usize, PortError>,
    /// The buffer that was submitted.
    pub data: Vec<u8>,
}

/// Outcome of a read request: the bytes received (possibly none) or the failure.
pub type ReadCompletion = Result<Vec<u8>, PortError>;

type WriteCallback = Box<dyn FnMut(WriteCompletion) + Send>;
type ReadCallback = Box<dyn FnMut(ReadCompletion) + Send>;

/// What the event loop observed on the device since the last call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// Hang-up or error condition; the next transfer will surface it.
    pub hangup: bool,
}

impl Readiness {
    pub fn readable() -> Self {
        Self {
            readable: true,
            ..Self::default()
        }
    }

    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    pub fn both() -> Self {
        Self {
            readable: true,
            writable: true,
            hangup: false,
        }
    }
}

/// Convert a host-style millisecond timeout, where any negative value means
/// "wait forever", into the engine's representation.
pub fn timeout_from_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}

/// Asynchronous engine for one serial port.
pub struct PortEngine {
    device: Option<Box<dyn SerialDevice>>,
    config: UartConfig,
    pending_write: Option<PendingWrite>,
    pending_read: Option<PendingRead>,
    write_completed: WriteCallback,
    read_completed: ReadCallback,
    notify_read: Option<ReadCallback>,
    /// Set when an unsolicited read failed; idle read interest stays off
    /// until the port is reconfigured or reopened.
    active_fault: bool,
    errors: ErrorReporter,
}

impl PortEngine {
    /// Create a closed engine with its completion callbacks bound.
    pub fn new<W, R>(write_completed: W, read_completed: R) -> Self
    where
        W: FnMut(WriteCompletion) + Send + 'static,
        R: FnMut(ReadCompletion) + Send + 'static,
    {
        Self {
            device: None,
            config: UartConfig::default(),
            pending_write: None,
            pending_read: None,
            write_completed: Box::new(write_completed),
            read_completed: Box::new(read_completed),
            notify_read: None,
            active_fault: false,
            errors: ErrorReporter::new(),
        }
    }

    /// Bind the callback that receives data arriving while no read is pending
    /// on an active port.
    pub fn with_notify<N>(mut self, notify_read: N) -> Self
    where
        N: FnMut(ReadCompletion) + Send + 'static,
    {
        self.notify_read = Some(Box::new(notify_read));
        self
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Name of the open device.
    pub fn name(&self) -> Option<&str> {
        self.device.as_deref().map(|d| d.name())
    }

    /// The configuration most recently applied.
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Description of the most recent failure on this engine.
    pub fn last_error(&self) -> Option<&str> {
        self.errors.last()
    }

    pub fn has_pending_read(&self) -> bool {
        self.pending_read.is_some()
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending_write.is_some()
    }

    /// Open the named serial port and apply `config`.
    ///
    /// # Errors
    ///
    /// - `PortError::AlreadyOpen` if this engine already owns a device
    /// - `PortError::DeviceNotFound` if no such port exists
    /// - `PortError::ConfigurationRejected` if `config` cannot be applied
    pub fn open(&mut self, name: &str, config: &UartConfig) -> Result<(), PortError> {
        if self.is_open() {
            return self.errors.track(Err(PortError::AlreadyOpen));
        }
        let device = self.errors.track(NativeDevice::open(name, config))?;
        self.install(Box::new(device), *config);
        Ok(())
    }

    /// Take ownership of an already-constructed device and apply `config`.
    pub fn open_device(
        &mut self,
        mut device: Box<dyn SerialDevice>,
        config: &UartConfig,
    ) -> Result<(), PortError> {
        if self.is_open() {
            return self.errors.track(Err(PortError::AlreadyOpen));
        }
        let applied = config
            .validate()
            .and_then(|()| device.apply_config(config));
        self.errors.track(applied)?;
        self.install(device, *config);
        Ok(())
    }

    fn install(&mut self, device: Box<dyn SerialDevice>, config: UartConfig) {
        info!(
            "Opened {} at {} baud ({})",
            device.name(),
            config.speed,
            if config.active { "active" } else { "passive" }
        );
        self.device = Some(device);
        self.config = config;
        self.active_fault = false;
        self.errors.clear();
    }

    /// Release the device.
    ///
    /// Pending requests are completed with `PortError::Cancelled` before the
    /// device is dropped. Closing a closed engine succeeds and does nothing.
    pub fn close(&mut self) -> Result<(), PortError> {
        if !self.is_open() {
            debug!("Close requested on a port that is not open");
            return Ok(());
        }

        if self.pending_read.take().is_some() {
            self.complete_read(Err(PortError::Cancelled));
        }
        if let Some(pending) = self.pending_write.take() {
            self.finish_write(pending, Err(PortError::Cancelled));
        }

        if let Some(device) = self.device.take() {
            info!("Closed {}", device.name());
        }
        Ok(())
    }

    /// Validate and apply a new configuration to the open device.
    ///
    /// Transfers already in flight are not restarted.
    pub fn configure(&mut self, config: &UartConfig) -> Result<(), PortError> {
        let applied = match self.device.as_deref_mut() {
            Some(device) => config
                .validate()
                .and_then(|()| device.apply_config(config)),
            None => Err(PortError::NotOpen),
        };
        self.errors.track(applied)?;

        debug!("Reconfigured: {:?}", config);
        self.config = *config;
        self.active_fault = false;
        Ok(())
    }

    /// Block until everything already handed to the OS has been transmitted.
    pub fn drain(&mut self) -> Result<(), PortError> {
        self.with_device(|device| device.drain())
    }

    /// Discard queued bytes in `direction`.
    pub fn flush(&mut self, direction: Direction) -> Result<(), PortError> {
        self.with_device(|device| device.flush(direction))
    }

    pub fn flush_all(&mut self) -> Result<(), PortError> {
        self.flush(Direction::Both)
    }

    pub fn signals(&mut self) -> Result<Signals, PortError> {
        self.with_device(|device| device.signals())
    }

    pub fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.with_device(|device| device.set_rts(level))
    }

    pub fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        self.with_device(|device| device.set_dtr(level))
    }

    pub fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        self.with_device(|device| device.set_break(level))
    }

    fn with_device<T>(
        &mut self,
        op: impl FnOnce(&mut dyn SerialDevice) -> Result<T, PortError>,
    ) -> Result<T, PortError> {
        let result = match self.device.as_deref_mut() {
            Some(device) => op(device),
            None => Err(PortError::NotOpen),
        };
        self.errors.track(result)
    }

    /// Start writing `data`.
    ///
    /// The outcome is always delivered through the write callback, possibly
    /// before this call returns. `timeout` of `None` waits forever.
    pub fn write(&mut self, data: Vec<u8>, timeout: Option<Duration>) {
        if self.pending_write.is_some() {
            return self.complete_write(data, Err(PortError::AlreadyPending(Transfer::Write)));
        }
        if !self.is_open() {
            return self.complete_write(data, Err(PortError::NotOpen));
        }

        let now = Instant::now();
        let mut pending = PendingWrite::new(data, timeout, now);
        match self.advance_write(&mut pending) {
            Err(e) => self.finish_write(pending, Err(e)),
            Ok(_) if pending.is_complete() => {
                let n = pending.total_len();
                self.finish_write(pending, Ok(n));
            }
            Ok(_) if pending.is_expired(now) => {
                let e = pending.timeout_error();
                self.finish_write(pending, Err(e));
            }
            Ok(_) => {
                debug!(
                    "Write pending: {}/{} bytes accepted immediately",
                    pending.written_len(),
                    pending.total_len()
                );
                self.pending_write = Some(pending);
            }
        }
    }

    /// Start a read.
    ///
    /// Completes as soon as any data is available, or with whatever arrived
    /// (possibly nothing) once `timeout` elapses. A zero timeout completes
    /// immediately. `None` waits forever.
    pub fn read(&mut self, timeout: Option<Duration>) {
        if self.pending_read.is_some() {
            return self.complete_read(Err(PortError::AlreadyPending(Transfer::Read)));
        }
        if !self.is_open() {
            return self.complete_read(Err(PortError::NotOpen));
        }

        let now = Instant::now();
        let mut pending = PendingRead::new(READ_CAPACITY, timeout, now);
        match self.fill_read(&mut pending) {
            Err(e) => self.complete_read(Err(e)),
            Ok(_) if pending.has_data() || pending.is_expired(now) => {
                self.complete_read(Ok(pending.into_data()))
            }
            Ok(_) => {
                debug!("Read pending, timeout {:?}", timeout);
                self.pending_read = Some(pending);
            }
        }
    }

    /// Make one attempt at progress on whatever the event loop reported, then
    /// check deadlines.
    pub fn process(&mut self, ready: Readiness) {
        if ready.readable || ready.hangup {
            self.progress_read(ready.hangup);
        }
        if ready.writable || ready.hangup {
            self.progress_write(ready.hangup);
        }
        self.process_timeouts();
    }

    /// Finish any request whose deadline has passed.
    ///
    /// An expired write fails with `PortError::Timeout`; an expired read
    /// succeeds with whatever it accumulated.
    pub fn process_timeouts(&mut self) {
        let now = Instant::now();

        match self.pending_write.take() {
            Some(pending) if pending.is_expired(now) => {
                debug!(
                    "Write timed out after {}/{} bytes",
                    pending.written_len(),
                    pending.total_len()
                );
                let e = pending.timeout_error();
                self.finish_write(pending, Err(e));
            }
            other => self.pending_write = other,
        }

        match self.pending_read.take() {
            Some(pending) if pending.is_expired(now) => {
                self.complete_read(Ok(pending.into_data()));
            }
            other => self.pending_read = other,
        }
    }

    /// The device should be watched for incoming data.
    pub fn wants_read(&self) -> bool {
        self.is_open() && (self.pending_read.is_some() || self.notifies_idle_reads())
    }

    /// The device should be watched for transmit room.
    pub fn wants_write(&self) -> bool {
        self.is_open() && self.pending_write.is_some()
    }

    /// The nearer of the two pending deadlines.
    pub fn next_deadline(&self) -> Option<Instant> {
        let write = self.pending_write.as_ref().and_then(PendingWrite::deadline);
        let read = self.pending_read.as_ref().and_then(PendingRead::deadline);
        write.into_iter().chain(read).min()
    }

    /// How long an event loop may block before this engine needs attention;
    /// `None` means indefinitely.
    pub fn wait_timeout(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    #[cfg(unix)]
    pub fn poll_fd(&self) -> Option<RawFd> {
        self.device.as_deref().and_then(|d| d.poll_fd())
    }

    pub fn wait_handle(&self) -> Option<WaitHandle> {
        self.device.as_deref().and_then(|d| d.wait_handle())
    }

    fn notifies_idle_reads(&self) -> bool {
        self.config.active
            && self.notify_read.is_some()
            && self.pending_read.is_none()
            && !self.active_fault
    }

    fn advance_write(&mut self, pending: &mut PendingWrite) -> Result<usize, PortError> {
        match self.device.as_deref_mut() {
            Some(device) => pending.advance(device),
            None => Err(PortError::NotOpen),
        }
    }

    fn fill_read(&mut self, pending: &mut PendingRead) -> Result<usize, PortError> {
        match self.device.as_deref_mut() {
            Some(device) => pending.fill(device),
            None => Err(PortError::NotOpen),
        }
    }

    fn progress_write(&mut self, hangup: bool) {
        let Some(mut pending) = self.pending_write.take() else {
            return;
        };
        match self.advance_write(&mut pending) {
            Err(e) => self.finish_write(pending, Err(e)),
            Ok(_) if pending.is_complete() => {
                let n = pending.total_len();
                self.finish_write(pending, Ok(n));
            }
            Ok(0) if hangup => self.finish_write(pending, Err(PortError::hangup())),
            Ok(_) => self.pending_write = Some(pending),
        }
    }

    fn progress_read(&mut self, hangup: bool) {
        if let Some(mut pending) = self.pending_read.take() {
            match self.fill_read(&mut pending) {
                Err(e) => self.complete_read(Err(e)),
                Ok(_) if pending.has_data() => self.complete_read(Ok(pending.into_data())),
                Ok(_) if hangup => self.complete_read(Err(PortError::hangup())),
                Ok(_) => self.pending_read = Some(pending),
            }
        } else if self.notifies_idle_reads() {
            self.notify_unsolicited(hangup);
        }
    }

    fn notify_unsolicited(&mut self, hangup: bool) {
        let mut scratch = PendingRead::new(READ_CAPACITY, None, Instant::now());
        let outcome = match self.fill_read(&mut scratch) {
            Err(e) => Err(e),
            Ok(_) if scratch.has_data() => Ok(scratch.into_data()),
            Ok(_) if hangup => Err(PortError::hangup()),
            Ok(_) => return,
        };

        match &outcome {
            Ok(data) => debug!("Unsolicited read: {} bytes", data.len()),
            Err(e) => {
                warn!("Unsolicited read failed: {}", e);
                self.errors.record(e);
                self.active_fault = true;
            }
        }
        if let Some(notify) = self.notify_read.as_mut() {
            notify(outcome);
        }
    }

    fn finish_write(&mut self, pending: PendingWrite, result: Result<usize, PortError>) {
        self.complete_write(pending.into_buffer(), result);
    }

    fn complete_write(&mut self, data: Vec<u8>, result: Result<usize, PortError>) {
        match &result {
            Ok(n) => debug!("Write completed: {} bytes", n),
            Err(e) => {
                log_failure(Transfer::Write, e);
                self.errors.record(e);
            }
        }
        (self.write_completed)(WriteCompletion { result, data });
    }

    fn complete_read(&mut self, result: ReadCompletion) {
        match &result {
            Ok(data) => debug!("Read completed: {} bytes", data.len()),
            Err(e) => {
                log_failure(Transfer::Read, e);
                self.errors.record(e);
            }
        }
        (self.read_completed)(result);
    }
}

fn log_failure(transfer: Transfer, err: &PortError) {
    match err {
        PortError::Timeout(_) | PortError::Cancelled => debug!("{} ended: {}", transfer, err),
        _ => warn!("{} failed: {}", transfer, err),
    }
}

impl Drop for PortEngine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for PortEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortEngine")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("pending_write", &self.pending_write)
            .field("pending_read", &self.pending_read)
            .finish_non_exhaustive()
    }
}
