//! Serial port discovery.

use crate::port::PortError;
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use tracing::debug;

/// One serial port present on the system.
///
/// Text fields are empty when the OS does not report them. `vid`/`pid` are
/// zero for anything that is not a USB device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub vid: u16,
    pub pid: u16,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(port: SerialPortInfo) -> Self {
        let mut info = PortInfo {
            name: port.port_name,
            ..PortInfo::default()
        };
        match port.port_type {
            SerialPortType::UsbPort(usb) => {
                info.description = usb.product.unwrap_or_default();
                info.manufacturer = usb.manufacturer.unwrap_or_default();
                info.serial_number = usb.serial_number.unwrap_or_default();
                info.vid = usb.vid;
                info.pid = usb.pid;
            }
            SerialPortType::BluetoothPort => info.description = "Bluetooth".to_string(),
            SerialPortType::PciPort => info.description = "PCI".to_string(),
            SerialPortType::Unknown => {}
        }
        info
    }
}

/// List the serial ports currently present.
pub fn available_ports() -> Result<Vec<PortInfo>, PortError> {
    let ports: Vec<PortInfo> = serialport::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    debug!("Found {} serial ports", ports.len());
    Ok(ports)
}
