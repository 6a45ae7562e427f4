//! Configuration schema definitions.
//!
//! Every section deserializes with defaults, so a file only needs the keys it
//! changes.

use super::error::{ConfigError, ConfigResult};
use crate::engine::timeout_from_millis;
use crate::port::{default_config, FlowControl, Parity, UartConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default UART settings and timeouts
    pub serial: SerialSection,
    pub logging: LoggingConfig,
    /// Hardware testing configuration
    pub testing: TestingConfig,
}

/// `[serial]` section: what a port is opened with when the caller does not say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    pub speed: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Deliver unsolicited receive data.
    pub active: bool,
    /// Read timeout in milliseconds; negative waits forever.
    pub read_timeout_ms: i64,
    /// Write timeout in milliseconds; negative waits forever.
    pub write_timeout_ms: i64,
    /// Port aliases for convenience
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialSection {
    fn default() -> Self {
        let uart = default_config();
        Self {
            speed: uart.speed,
            data_bits: uart.data_bits,
            stop_bits: uart.stop_bits,
            parity: uart.parity,
            flow_control: uart.flow_control,
            active: uart.active,
            read_timeout_ms: 1000,
            write_timeout_ms: -1,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialSection {
    /// The section's UART settings, validated for this platform.
    pub fn uart_config(&self) -> ConfigResult<UartConfig> {
        let config = UartConfig {
            active: self.active,
            speed: self.speed,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            flow_control: self.flow_control,
        };
        config
            .validate()
            .map_err(|e| ConfigError::validation("serial", e.to_string()))?;
        Ok(config)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        timeout_from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        timeout_from_millis(self.write_timeout_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset: "trace", "debug", "info", "warn", "error"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    Compact,
}

/// `[testing]` section used by hardware tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Test port name
    pub port: Option<String>,
    pub speed: u32,
    /// TX is wired to RX on the test port
    pub loopback: bool,
    /// Test timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            speed: 115200,
            loopback: false,
            timeout_ms: 2000,
        }
    }
}

impl TestingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
