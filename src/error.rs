//! Last-error bookkeeping.
//!
//! Hosts that speak integer result codes need a human-readable cause after a
//! negative return. Each engine keeps its own [`ErrorReporter`], so one port's
//! failure never overwrites the diagnostic another port is about to read.

use crate::port::PortError;

/// Holds the description of the most recent failure seen by one engine.
#[derive(Debug, Default, Clone)]
pub struct ErrorReporter {
    last: Option<String>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `err` as the most recent failure.
    pub fn record(&mut self, err: &PortError) {
        self.last = Some(err.to_string());
    }

    /// Pass `result` through, recording the error if there is one.
    pub fn track<T>(&mut self, result: Result<T, PortError>) -> Result<T, PortError> {
        if let Err(ref err) = result {
            self.record(err);
        }
        result
    }

    /// Description of the most recent failure, if any occurred.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
