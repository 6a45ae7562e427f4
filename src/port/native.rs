//! Native serial device implementation.
//!
//! Wraps the `serialport` crate's platform port type with our own
//! `SerialDevice` trait. The port is opened with a zero timeout, and on unix
//! with `O_NONBLOCK`, so every transfer returns immediately; the reactor tells
//! the engine when to retry.

use super::error::{would_block, PortError};
use super::settings::{self, Direction, Parity, UartConfig};
use super::signals::Signals;
use super::traits::SerialDevice;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

#[cfg(unix)]
type NativePort = serialport::TTYPort;
#[cfg(windows)]
type NativePort = serialport::COMPort;

/// Serial device backed by the operating system's serial driver.
pub struct NativeDevice {
    /// The underlying serialport implementation.
    port: NativePort,
    /// The port name/path for identification.
    name: String,
    /// Last levels driven on the output lines.
    #[cfg_attr(unix, allow(dead_code))]
    dtr: bool,
    #[cfg_attr(unix, allow(dead_code))]
    rts: bool,
}

impl NativeDevice {
    /// Open a serial device with the given configuration.
    ///
    /// # Arguments
    /// * `port_name` - The system path to the serial port (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `config` - Configuration parameters for the port
    ///
    /// # Example
    /// ```no_run
    /// use uart_engine::port::{NativeDevice, UartConfig};
    ///
    /// let device = NativeDevice::open("/dev/ttyUSB0", &UartConfig::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &UartConfig) -> Result<Self, PortError> {
        config.validate()?;

        let port = serialport::new(port_name, config.speed)
            .data_bits(settings::data_bits(config.data_bits)?)
            .stop_bits(settings::stop_bits(config.stop_bits)?)
            .parity(config.parity.base())
            .flow_control(config.flow_control.into())
            .timeout(Duration::ZERO)
            .open_native()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice
                | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    PortError::not_found(port_name)
                }
                _ => PortError::from(e),
            })?;

        let mut device = Self::from_native(port, port_name)?;
        device.apply_parity_extras(config.parity)?;
        debug!("Opened native serial device {}", port_name);
        Ok(device)
    }

    /// Wrap an already-open platform port, e.g. one half of a pseudo-terminal
    /// pair.
    pub fn from_native(mut port: NativePort, name: impl Into<String>) -> Result<Self, PortError> {
        port.set_timeout(Duration::ZERO)?;
        #[cfg(unix)]
        set_nonblocking(port.as_raw_fd())?;
        Ok(Self {
            port,
            name: name.into(),
            dtr: true,
            rts: true,
        })
    }

    /// Get a reference to the underlying serialport implementation.
    pub fn as_raw(&self) -> &NativePort {
        &self.port
    }

    #[cfg(unix)]
    fn apply_parity_extras(&mut self, parity: Parity) -> Result<(), PortError> {
        let fd = self.port.as_raw_fd();
        let mut tio = termios::get(fd)?;

        #[cfg(target_os = "linux")]
        {
            tio.c_cflag &= !libc::CMSPAR;
            match parity {
                Parity::Space => {
                    tio.c_cflag |= libc::PARENB | libc::CMSPAR;
                    tio.c_cflag &= !libc::PARODD;
                }
                Parity::Mark => tio.c_cflag |= libc::PARENB | libc::CMSPAR | libc::PARODD,
                _ => {}
            }
        }
        if parity == Parity::Ignore {
            tio.c_iflag |= libc::IGNPAR;
        } else {
            tio.c_iflag &= !libc::IGNPAR;
        }

        termios::set(fd, &tio)
    }

    #[cfg(not(unix))]
    fn apply_parity_extras(&mut self, _parity: Parity) -> Result<(), PortError> {
        Ok(())
    }

    /// Run every setter for `config`, stopping at the first failure.
    fn apply_settings(&mut self, config: &UartConfig) -> Result<(), PortError> {
        self.port.set_baud_rate(config.speed)?;
        self.port
            .set_data_bits(settings::data_bits(config.data_bits)?)?;
        self.port
            .set_stop_bits(settings::stop_bits(config.stop_bits)?)?;
        self.port.set_parity(config.parity.base())?;
        self.port.set_flow_control(config.flow_control.into())?;
        self.apply_parity_extras(config.parity)
    }

    #[cfg(unix)]
    fn snapshot(&self) -> Result<Snapshot, PortError> {
        termios::get(self.port.as_raw_fd())
    }

    #[cfg(unix)]
    fn restore(&mut self, saved: &Snapshot) -> Result<(), PortError> {
        termios::set(self.port.as_raw_fd(), saved)
    }

    #[cfg(not(unix))]
    fn snapshot(&self) -> Result<Snapshot, PortError> {
        Ok(Snapshot {
            baud_rate: self.port.baud_rate()?,
            data_bits: self.port.data_bits()?,
            stop_bits: self.port.stop_bits()?,
            parity: self.port.parity()?,
            flow_control: self.port.flow_control()?,
        })
    }

    #[cfg(not(unix))]
    fn restore(&mut self, saved: &Snapshot) -> Result<(), PortError> {
        self.port.set_baud_rate(saved.baud_rate)?;
        self.port.set_data_bits(saved.data_bits)?;
        self.port.set_stop_bits(saved.stop_bits)?;
        self.port.set_parity(saved.parity)?;
        self.port.set_flow_control(saved.flow_control)?;
        Ok(())
    }
}

/// Line settings captured before a reconfiguration.
#[cfg(unix)]
type Snapshot = libc::termios;

#[cfg(not(unix))]
struct Snapshot {
    baud_rate: u32,
    data_bits: serialport::DataBits,
    stop_bits: serialport::StopBits,
    parity: serialport::Parity,
    flow_control: serialport::FlowControl,
}

#[cfg(unix)]
fn set_nonblocking(fd: RawFd) -> Result<(), PortError> {
    // SAFETY: fcntl on a descriptor owned by the caller's port.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(PortError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(PortError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(unix)]
mod termios {
    use super::PortError;
    use std::os::unix::io::RawFd;

    pub(super) fn get(fd: RawFd) -> Result<libc::termios, PortError> {
        // SAFETY: an all-zero termios is a valid out-parameter for tcgetattr.
        let mut tio: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: fd is owned by the port for the duration of the call.
        if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
            return Err(PortError::Io(std::io::Error::last_os_error()));
        }
        Ok(tio)
    }

    pub(super) fn set(fd: RawFd, tio: &libc::termios) -> Result<(), PortError> {
        // SAFETY: as above; `tio` came from tcgetattr.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, tio) } != 0 {
            return Err(PortError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl SerialDevice for NativeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if would_block(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn try_read(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if would_block(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    /// Apply `config` as a whole: if any setting fails, the line settings
    /// that were in force before the call are put back.
    fn apply_config(&mut self, config: &UartConfig) -> Result<(), PortError> {
        let saved = self.snapshot()?;
        let applied = self.apply_settings(config);
        if let Err(ref e) = applied {
            if let Err(restore) = self.restore(&saved) {
                warn!("{}: failed to restore settings after {}: {}", self.name, e, restore);
            }
        }
        applied
    }

    fn drain(&mut self) -> Result<(), PortError> {
        // The platform flush waits for the transmit queue (tcdrain /
        // FlushFileBuffers).
        self.port.flush().map_err(PortError::Io)
    }

    fn flush(&mut self, direction: Direction) -> Result<(), PortError> {
        self.port.clear(direction.into()).map_err(PortError::from)
    }

    #[cfg(unix)]
    fn signals(&mut self) -> Result<Signals, PortError> {
        super::signals::modem::read(self.port.as_raw_fd())
    }

    #[cfg(not(unix))]
    fn signals(&mut self) -> Result<Signals, PortError> {
        Ok(Signals {
            dsr: self.port.read_data_set_ready()?,
            dtr: self.dtr,
            rts: self.rts,
            st: false,
            sr: false,
            cts: self.port.read_clear_to_send()?,
            cd: self.port.read_carrier_detect()?,
            rng: self.port.read_ring_indicator()?,
        })
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.port.write_request_to_send(level)?;
        self.rts = level;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<(), PortError> {
        self.port.write_data_terminal_ready(level)?;
        self.dtr = level;
        Ok(())
    }

    fn set_break(&mut self, level: bool) -> Result<(), PortError> {
        if level {
            self.port.set_break()?;
        } else {
            self.port.clear_break()?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn poll_fd(&self) -> Option<RawFd> {
        Some(self.port.as_raw_fd())
    }
}

impl std::fmt::Debug for NativeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeDevice")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}
