//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `UART_ENGINE_CONFIG` environment variable (explicit path)
//! 2. `./uart-engine.toml` (current directory)
//! 3. `uart-engine.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any value can be overridden with `UART_ENGINE_<SECTION>_<KEY>`:
//! - `UART_ENGINE_SERIAL_SPEED=115200`
//! - `UART_ENGINE_SERIAL_PARITY=odd`
//! - `UART_ENGINE_LOGGING_FORMAT=json`
//! - `UART_ENGINE_TESTING_PORT=/dev/ttyUSB0`
//!
//! # Example
//!
//! ```rust,no_run
//! use uart_engine::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let uart = loader.config().serial.uart_config()?;
//! println!("Default speed: {}", uart.speed);
//! # Ok::<(), uart_engine::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialSection, TestingConfig};
