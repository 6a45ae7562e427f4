//! Declarative UART settings and their translation to OS-level serial settings.
//!
//! [`UartConfig`] is what callers hand to `open` and `configure`. Validation
//! happens here, before anything touches a device, so a rejected
//! configuration never leaves a port half-reconfigured.

use super::error::PortError;
use serde::{Deserialize, Serialize};

/// Configuration parameters for a UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UartConfig {
    /// Deliver unsolicited receive data through the notify callback.
    pub active: bool,

    /// Baud rate (bits per second).
    pub speed: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: u8,

    /// Number of stop bits (1 or 2).
    pub stop_bits: u8,

    /// Parity mode.
    pub parity: Parity,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for UartConfig {
    fn default() -> Self {
        default_config()
    }
}

/// The baseline used when the caller supplies no overrides: 9600 8N1, no flow
/// control, active.
pub fn default_config() -> UartConfig {
    UartConfig {
        active: true,
        speed: 9600,
        data_bits: 8,
        stop_bits: 1,
        parity: Parity::None,
        flow_control: FlowControl::None,
    }
}

impl UartConfig {
    /// Builder-style speed override.
    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    /// Builder-style active flag override.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Check that every field can be expressed on this platform.
    ///
    /// Unsupported combinations are rejected, never clamped.
    pub fn validate(&self) -> Result<(), PortError> {
        if self.speed == 0 {
            return Err(PortError::rejected("speed must be greater than zero"));
        }
        data_bits(self.data_bits)?;
        stop_bits(self.stop_bits)?;
        self.parity.check_supported()?;
        Ok(())
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    /// Parity bit always 0.
    Space,
    /// Parity bit always 1.
    Mark,
    /// Parity bit generated, parity errors on receive ignored.
    Ignore,
}

impl Parity {
    /// The part of this mode the serial library can express directly.
    ///
    /// Space and mark start from "no parity" and get their sticky bit from the
    /// platform layer; ignore generates even parity.
    pub(crate) fn base(self) -> serialport::Parity {
        match self {
            Parity::None | Parity::Space | Parity::Mark => serialport::Parity::None,
            Parity::Even | Parity::Ignore => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }

    fn check_supported(self) -> Result<(), PortError> {
        match self {
            Parity::None | Parity::Even | Parity::Odd => Ok(()),
            Parity::Space | Parity::Mark if cfg!(target_os = "linux") => Ok(()),
            Parity::Ignore if cfg!(unix) => Ok(()),
            other => Err(PortError::rejected(format!(
                "parity {:?} is not supported on this platform",
                other
            ))),
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Which queue a flush discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Receive,
    Transmit,
    Both,
}

impl From<Direction> for serialport::ClearBuffer {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Receive => serialport::ClearBuffer::Input,
            Direction::Transmit => serialport::ClearBuffer::Output,
            Direction::Both => serialport::ClearBuffer::All,
        }
    }
}

pub(crate) fn data_bits(bits: u8) -> Result<serialport::DataBits, PortError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(PortError::rejected(format!(
            "data bits must be 5, 6, 7 or 8 (got {})",
            other
        ))),
    }
}

pub(crate) fn stop_bits(bits: u8) -> Result<serialport::StopBits, PortError> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(PortError::rejected(format!(
            "stop bits must be 1 or 2 (got {})",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = UartConfig::default();
        assert!(config.active);
        assert_eq!(config.speed, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_nine_data_bits() {
        let config = UartConfig {
            data_bits: 9,
            ..default_config()
        };
        assert!(matches!(
            config.validate(),
            Err(PortError::ConfigurationRejected(msg)) if msg.contains("data bits")
        ));
    }

    #[test]
    fn test_rejects_bad_stop_bits_and_speed() {
        let config = UartConfig {
            stop_bits: 3,
            ..default_config()
        };
        assert!(config.validate().is_err());

        let config = default_config().with_speed(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_bits_conversion() {
        assert_eq!(data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert!(data_bits(4).is_err());
    }

    #[test]
    fn test_flow_control_conversion() {
        let flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(flow, serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_parity_base() {
        assert_eq!(Parity::Odd.base(), serialport::Parity::Odd);
        assert_eq!(Parity::Mark.base(), serialport::Parity::None);
        assert_eq!(Parity::Ignore.base(), serialport::Parity::Even);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sticky_parity_supported_on_linux() {
        for parity in [Parity::Space, Parity::Mark, Parity::Ignore] {
            let config = UartConfig {
                parity,
                ..default_config()
            };
            assert!(config.validate().is_ok(), "{:?} should be accepted", parity);
        }
    }

    #[test]
    fn test_direction_to_clear_buffer() {
        let clear: serialport::ClearBuffer = Direction::Both.into();
        assert!(matches!(clear, serialport::ClearBuffer::All));
    }

    #[test]
    fn test_deserialize_partial_table() {
        let config: UartConfig = toml::from_str(
            r#"
            speed = 115200
            parity = "mark"
            active = false
            "#,
        )
        .unwrap();
        assert_eq!(config.speed, 115200);
        assert_eq!(config.parity, Parity::Mark);
        assert!(!config.active);
        assert_eq!(config.data_bits, 8);
    }
}
