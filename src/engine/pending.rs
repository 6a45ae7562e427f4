//! In-flight transfer bookkeeping.

use crate::port::{PortError, SerialDevice};
use std::time::{Duration, Instant};
use tracing::debug;

/// Most bytes a single read request returns.
pub const READ_CAPACITY: usize = 4096;

/// Absolute deadline for a request, `None` meaning it may wait forever.
///
/// A timeout too large to represent as an `Instant` is treated as no deadline.
pub(crate) fn deadline_after(now: Instant, timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| now.checked_add(t))
}

fn expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| now >= d)
}

/// A write accepted by the engine and not yet finished.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    data: Vec<u8>,
    written: usize,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl PendingWrite {
    pub(crate) fn new(data: Vec<u8>, timeout: Option<Duration>, now: Instant) -> Self {
        Self {
            data,
            written: 0,
            timeout,
            deadline: deadline_after(now, timeout),
        }
    }

    /// Hand the unwritten tail to the device once.
    ///
    /// Returns how many bytes the device took.
    pub(crate) fn advance(&mut self, device: &mut dyn SerialDevice) -> Result<usize, PortError> {
        if self.is_complete() {
            return Ok(0);
        }
        let n = device.try_write(&self.data[self.written..])?;
        self.written = (self.written + n).min(self.data.len());
        Ok(n)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.written == self.data.len()
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        expired(self.deadline, now)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn timeout_error(&self) -> PortError {
        PortError::timeout(self.timeout.unwrap_or_default())
    }

    pub(crate) fn total_len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn written_len(&self) -> usize {
        self.written
    }

    pub(crate) fn into_buffer(self) -> Vec<u8> {
        self.data
    }
}

/// A read accepted by the engine and not yet finished.
#[derive(Debug)]
pub(crate) struct PendingRead {
    received: Vec<u8>,
    capacity: usize,
    deadline: Option<Instant>,
}

impl PendingRead {
    pub(crate) fn new(capacity: usize, timeout: Option<Duration>, now: Instant) -> Self {
        Self {
            received: Vec::new(),
            capacity,
            deadline: deadline_after(now, timeout),
        }
    }

    /// Pull whatever the device has, up to the remaining capacity.
    ///
    /// Returns how many bytes arrived during this call. A device error after
    /// some bytes were already collected ends the call with those bytes; the
    /// error is left for the next attempt to hit.
    pub(crate) fn fill(&mut self, device: &mut dyn SerialDevice) -> Result<usize, PortError> {
        let before = self.received.len();
        while self.received.len() < self.capacity {
            let start = self.received.len();
            self.received.resize(self.capacity, 0);
            let result = device.try_read(&mut self.received[start..]);
            let n = *result.as_ref().unwrap_or(&0);
            self.received.truncate(start + n);
            match result {
                Err(e) if self.has_data() => {
                    debug!("Read stopped after {} bytes: {}", self.received.len(), e);
                    break;
                }
                Err(e) => return Err(e),
                Ok(0) => break,
                Ok(_) => {}
            }
        }
        Ok(self.received.len() - before)
    }

    pub(crate) fn has_data(&self) -> bool {
        !self.received.is_empty()
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        expired(self.deadline, now)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.received
    }
}
