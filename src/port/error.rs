//! Port-specific error types.
//!
//! Every failure the engine can report, whether returned from a synchronous
//! call or delivered through a completion callback, is a [`PortError`].

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// The two transfer directions an engine tracks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transfer {
    Read,
    Write,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// A request of the same direction is still in flight.
    #[error("A {0} is already pending")]
    AlreadyPending(Transfer),

    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    DeviceNotFound(String),

    /// The requested settings cannot be expressed on this device.
    #[error("Configuration rejected: {0}")]
    ConfigurationRejected(String),

    /// A write did not finish before its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The pending operation was aborted because the port was closed.
    #[error("Operation cancelled: port closed")]
    Cancelled,
}

impl PortError {
    /// Create a DeviceNotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::DeviceNotFound(port_name.into())
    }

    /// Create a ConfigurationRejected error from a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::ConfigurationRejected(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Stable negative result code for hosts that speak integer results.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotOpen => -1,
            Self::AlreadyOpen => -2,
            Self::AlreadyPending(_) => -3,
            Self::DeviceNotFound(_) => -4,
            Self::ConfigurationRejected(_) => -5,
            Self::Timeout(_) => -6,
            Self::Io(_) => -7,
            Self::Cancelled => -8,
        }
    }

    pub(crate) fn hangup() -> Self {
        Self::Io(io::Error::new(io::ErrorKind::BrokenPipe, "device hung up"))
    }
}

impl From<serialport::Error> for PortError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::DeviceNotFound(err.description),
            serialport::ErrorKind::InvalidInput => Self::ConfigurationRejected(err.description),
            serialport::ErrorKind::Io(kind) => Self::Io(io::Error::new(kind, err.description)),
            _ => Self::Io(io::Error::other(err.description)),
        }
    }
}

/// True for the error kinds a non-blocking transfer reports when the device
/// simply has nothing to give or no room to take right now.
pub(crate) fn would_block(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
