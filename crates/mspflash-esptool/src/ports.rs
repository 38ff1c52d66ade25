//! Serial port discovery

use std::time::Duration;

use serialport::{SerialPortInfo, SerialPortType};

use crate::error::Result;

/// A serial port the device may be attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS identifier (`/dev/ttyUSB0`, `COM3`, ...)
    pub name: String,
    /// Human readable description
    pub description: String,
}

fn describe(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let mut desc = format!(
                "{} - {}",
                info.port_name,
                usb.product.as_deref().unwrap_or("USB serial")
            );
            if let Some(manufacturer) = &usb.manufacturer {
                desc.push_str(&format!(" ({})", manufacturer));
            }
            desc.push_str(&format!(" [{:04x}:{:04x}]", usb.vid, usb.pid));
            desc
        }
        SerialPortType::PciPort => format!("{} - PCI serial", info.port_name),
        SerialPortType::BluetoothPort => format!("{} - Bluetooth serial", info.port_name),
        SerialPortType::Unknown => format!("{} - n/a", info.port_name),
    }
}

/// List the serial ports present on this host
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    log::debug!("Found {} serial port(s)", ports.len());
    Ok(ports
        .iter()
        .map(|p| PortInfo {
            name: p.port_name.clone(),
            description: describe(p),
        })
        .collect())
}

/// Check that `port` can be opened, then release it again
///
/// The vendor tool opens the port itself, so the handle is dropped before
/// returning.
pub fn check_port(port: &str) -> mspflash_core::Result<()> {
    serialport::new(port, 115_200)
        .timeout(Duration::from_secs(1))
        .open()
        .map(drop)
        .map_err(|e| mspflash_core::Error::Connection {
            port: port.to_string(),
            reason: e.to_string(),
        })
}
