//! Device abstraction layer for serial communication.
//!
//! Provides the `SerialDevice` trait the engine drives, the native and mock
//! implementations, the declarative UART settings and the modem-line snapshot.

pub mod error;
pub mod mock;
pub mod native;
pub mod settings;
pub mod signals;
pub mod traits;

pub use error::{PortError, Transfer};
pub use mock::{MockDevice, MockHandle};
pub use native::NativeDevice;
pub use settings::{default_config, Direction, FlowControl, Parity, UartConfig};
pub use signals::Signals;
pub use traits::SerialDevice;
