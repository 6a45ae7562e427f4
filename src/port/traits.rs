//! Core traits for serial device abstraction.
//!
//! Defines the `SerialDevice` trait the engine drives, so that real serial
//! ports, pseudo-terminals and mock implementations can be used
//! interchangeably.

use super::error::PortError;
use super::settings::{Direction, UartConfig};
use super::signals::Signals;
use crate::reactor::WaitHandle;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Non-blocking operations on one open serial device.
///
/// Transfers never wait: when the device has nothing to give or no room to
/// take, they return `Ok(0)`. Readiness is learned from the reactor, not by
/// blocking here.
pub trait SerialDevice: Send + std::fmt::Debug {
    /// Get the name/path of this serial device.
    fn name(&self) -> &str;

    /// Hand as many bytes as the transmit queue accepts right now.
    ///
    /// Returns the number of bytes accepted, possibly zero.
    fn try_write(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Copy whatever has been received into `buffer`.
    ///
    /// Returns the number of bytes read, zero if nothing is waiting.
    fn try_read(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Apply an already-validated configuration.
    fn apply_config(&mut self, config: &UartConfig) -> Result<(), PortError>;

    /// Block until the transmit queue has been sent.
    fn drain(&mut self) -> Result<(), PortError>;

    /// Discard queued bytes in the given direction.
    fn flush(&mut self, direction: Direction) -> Result<(), PortError>;

    fn signals(&mut self) -> Result<Signals, PortError>;

    fn set_rts(&mut self, level: bool) -> Result<(), PortError>;

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError>;

    fn set_break(&mut self, level: bool) -> Result<(), PortError>;

    /// File descriptor to register with `poll(2)`, if the device has one.
    #[cfg(unix)]
    fn poll_fd(&self) -> Option<RawFd> {
        None
    }

    /// Handle signalled when the device may make progress, if it has one.
    fn wait_handle(&self) -> Option<WaitHandle> {
        None
    }
}
