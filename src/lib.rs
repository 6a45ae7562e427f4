//! Asynchronous UART engine for host-language serial drivers.
//!
//! One [`PortEngine`] drives one serial port. Reads and writes never block;
//! they complete through callbacks while an external event loop, talking to
//! the engine through a [`reactor::ReactorAdapter`], reports when the device
//! is ready.
//!
//! # Modules
//!
//! - `engine`: the per-port state machine and completion callbacks
//! - `reactor`: poll(2) and wait-handle bridges to host event loops
//! - `port`: device abstraction, native and mock devices, UART settings
//! - `enumerate`: serial port discovery
//! - `error`: per-engine last-error reporting
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for binaries
//!
//! # Example
//!
//! ```
//! use uart_engine::port::{default_config, MockDevice};
//! use uart_engine::PortEngine;
//!
//! let mut engine = PortEngine::new(
//!     |done| println!("wrote {:?}", done.result),
//!     |done| println!("read {:?}", done),
//! );
//! engine
//!     .open_device(Box::new(MockDevice::loopback("LOOP0")), &default_config())
//!     .unwrap();
//! engine.write(b"hello".to_vec(), None);
//! engine.read(None);
//! ```

pub mod config;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod logging;
pub mod port;
pub mod reactor;

pub use engine::{
    timeout_from_millis, PortEngine, ReadCompletion, Readiness, WriteCompletion, READ_CAPACITY,
};
pub use enumerate::{available_ports, PortInfo};
pub use error::ErrorReporter;
pub use port::{
    default_config, Direction, FlowControl, Parity, PortError, SerialDevice, Signals, Transfer,
    UartConfig,
};
pub use reactor::{PlatformReactor, ReactorAdapter, WaitDescriptor, WaitHandle};

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
