//! Mock serial device implementation for testing.
//!
//! Provides a `MockDevice` that simulates a UART without requiring hardware.
//! The device is boxed into an engine while the test keeps a [`MockHandle`]
//! onto the same shared state to feed input, throttle the transmit side,
//! inject failures and inspect what the engine did.

use super::error::PortError;
use super::settings::{Direction, UartConfig};
use super::signals::Signals;
use super::traits::SerialDevice;
use crate::reactor::WaitHandle;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Inner state of the mock device, shared with its handles.
#[derive(Debug, Default)]
struct MockState {
    /// Bytes waiting to be returned by reads.
    read_queue: VecDeque<u8>,
    /// Every byte the device accepted, in order.
    written: Vec<u8>,
    /// Bytes the transmit side will still accept; `None` is unlimited.
    write_capacity: Option<usize>,
    /// Accepted bytes are fed back into the read queue.
    loopback: bool,
    /// Fail the next read/write with this error kind.
    fail_read: Option<io::ErrorKind>,
    fail_write: Option<io::ErrorKind>,
    /// Fail the first read that finds the input queue empty.
    fail_drained: Option<io::ErrorKind>,
    /// Fail the next `apply_config` without applying anything.
    fail_config: Option<io::ErrorKind>,
    /// Every configuration applied, in order.
    applied: Vec<UartConfig>,
    /// Every flush request, in order.
    flushes: Vec<Direction>,
    drains: usize,
    signals: Signals,
    break_on: bool,
    /// The device was dropped by its owner.
    released: bool,
    #[cfg(unix)]
    poll_fd: Option<RawFd>,
    wait_handle: Option<WaitHandle>,
}

/// Mock serial device.
///
/// # Example
/// ```
/// use uart_engine::port::{MockDevice, SerialDevice};
///
/// let mut device = MockDevice::new("MOCK0");
/// let handle = device.handle();
///
/// handle.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 13];
/// let n = device.try_read(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// device.try_write(b"Response").unwrap();
/// assert_eq!(handle.written(), b"Response");
/// ```
pub struct MockDevice {
    name: String,
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of a [`MockDevice`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a new mock device with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let signals = Signals {
            dtr: true,
            rts: true,
            ..Signals::default()
        };
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState {
                signals,
                ..MockState::default()
            })),
        }
    }

    /// Create a mock whose written bytes come straight back as input.
    pub fn loopback(name: impl Into<String>) -> Self {
        let device = Self::new(name);
        device.state.lock().loopback = true;
        device
    }

    /// Get a handle onto this device's shared state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockHandle {
    /// Enqueue bytes to be returned by subsequent reads.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Everything the device has accepted so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Everything the device has accepted so far, clearing the record.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// Limit how many more bytes the transmit side accepts.
    pub fn set_write_capacity(&self, capacity: Option<usize>) {
        self.state.lock().write_capacity = capacity;
    }

    /// Let `n` more bytes through a limited transmit side.
    pub fn grant_write_capacity(&self, n: usize) {
        let mut state = self.state.lock();
        if let Some(capacity) = state.write_capacity.as_mut() {
            *capacity += n;
        }
    }

    /// Make the next read fail with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.state.lock().fail_read = Some(kind);
    }

    /// Make the next write fail with `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state.lock().fail_write = Some(kind);
    }

    /// Make the first read that finds no queued input fail with `kind`.
    pub fn fail_when_drained(&self, kind: io::ErrorKind) {
        self.state.lock().fail_drained = Some(kind);
    }

    /// Make the next configuration attempt fail with `kind`.
    pub fn fail_next_config(&self, kind: io::ErrorKind) {
        self.state.lock().fail_config = Some(kind);
    }

    /// Drive the status inputs.
    pub fn set_inputs(&self, dsr: bool, cts: bool, cd: bool, rng: bool) {
        let mut state = self.state.lock();
        state.signals.dsr = dsr;
        state.signals.cts = cts;
        state.signals.cd = cd;
        state.signals.rng = rng;
    }

    /// Every configuration applied to the device, in order.
    pub fn applied_configs(&self) -> Vec<UartConfig> {
        self.state.lock().applied.clone()
    }

    pub fn flushes(&self) -> Vec<Direction> {
        self.state.lock().flushes.clone()
    }

    pub fn drain_count(&self) -> usize {
        self.state.lock().drains
    }

    pub fn break_on(&self) -> bool {
        self.state.lock().break_on
    }

    /// Whether the owner has dropped the device.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Report `fd` as the device's poll descriptor.
    #[cfg(unix)]
    pub fn set_poll_fd(&self, fd: Option<RawFd>) {
        self.state.lock().poll_fd = fd;
    }

    /// Report `handle` as the device's wait handle.
    pub fn set_wait_handle(&self, handle: Option<WaitHandle>) {
        self.state.lock().wait_handle = handle;
    }
}

impl SerialDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if let Some(kind) = state.fail_write.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected write failure")));
        }

        let n = match state.write_capacity.as_mut() {
            Some(capacity) => {
                let n = data.len().min(*capacity);
                *capacity -= n;
                n
            }
            None => data.len(),
        };

        state.written.extend_from_slice(&data[..n]);
        if state.loopback {
            state.read_queue.extend(&data[..n]);
        }
        Ok(n)
    }

    fn try_read(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if let Some(kind) = state.fail_read.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected read failure")));
        }
        if state.read_queue.is_empty() {
            if let Some(kind) = state.fail_drained.take() {
                return Err(PortError::Io(io::Error::new(kind, "injected read failure")));
            }
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn apply_config(&mut self, config: &UartConfig) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_config.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected configuration failure")));
        }
        state.applied.push(*config);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), PortError> {
        self.state.lock().drains += 1;
        Ok(())
    }

    fn flush(&mut self, direction: Direction) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if matches!(direction, Direction::Receive | Direction::Both) {
            state.read_queue.clear();
        }
        state.flushes.push(direction);
        Ok(())
    }

    fn signals(&mut self) -> Result<Signals, PortError> {
        Ok(self.state.lock().signals)
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().signals.rts = level;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().signals.dtr = level;
        Ok(())
    }

    fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        self.state.lock().break_on = level;
        Ok(())
    }

    #[cfg(unix)]
    fn poll_fd(&self) -> Option<RawFd> {
        self.state.lock().poll_fd
    }

    fn wait_handle(&self) -> Option<WaitHandle> {
        self.state.lock().wait_handle
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.lock().released = true;
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.name)
            .field("available_bytes", &self.state.lock().read_queue.len())
            .finish()
    }
}
