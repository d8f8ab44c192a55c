//! Serial port transport
//!
//! Connects to the module through a USB-UART bridge or a native UART.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate configuration
//! - A reader thread standing in for the receive interrupt

use super::{RxRing, Transport};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use wgxlink_core::{Error, LinkError, Result};

/// Bytes the receive ring can hold before it starts dropping
const RX_RING_CAPACITY: usize = 4096;

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialParams {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout of the reader thread in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for SerialParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            read_timeout_ms: 10,
        }
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a module could be attached to
///
/// Filters to UART bridge patterns:
/// - Windows: COM*
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*, /dev/ttyS*, /dev/ttyAMA*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.SLAB_USBtoUART*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                    match &usb_info.manufacturer {
                        Some(mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

fn is_candidate_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    const PREFIXES: [&str; 7] = [
        "/dev/ttyUSB",
        "/dev/ttyACM",
        "/dev/ttyS",
        "/dev/ttyAMA",
        "/dev/cu.usbserial-",
        "/dev/cu.SLAB_USBtoUART",
        "/dev/cu.usbmodem",
    ];
    PREFIXES.iter().any(|prefix| port_name.starts_with(prefix))
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => format!(
            "USB {} {}",
            usb_info.manufacturer.as_deref().unwrap_or("Device"),
            usb_info.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Transport over a real serial port
pub struct SerialTransport {
    name: String,
    port: Box<dyn serialport::SerialPort>,
    rx: Arc<RxRing>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Open the port and start the reader thread
    pub fn open(params: &SerialParams) -> Result<Self> {
        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(Duration::from_millis(params.read_timeout_ms))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                Error::from(LinkError::Transport {
                    reason: format!("failed to open {}: {}", params.port, e),
                })
            })?;

        let mut reader_port = port.try_clone().map_err(|e| LinkError::Transport {
            reason: format!("failed to clone {}: {}", params.port, e),
        })?;

        let rx = Arc::new(RxRing::new(RX_RING_CAPACITY));
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader = {
            let rx = rx.clone();
            let shutdown = shutdown.clone();
            let name = params.port.clone();
            std::thread::Builder::new()
                .name("wgx-rx".to_string())
                .spawn(move || {
                    let mut chunk = [0u8; 64];
                    while !shutdown.load(Ordering::Acquire) {
                        match reader_port.read(&mut chunk) {
                            Ok(0) => {}
                            Ok(n) => {
                                rx.push(&chunk[..n]);
                            }
                            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                            Err(e) => {
                                tracing::error!("Serial read on {} failed: {}", name, e);
                                break;
                            }
                        }
                    }
                })?
        };

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);

        Ok(Self {
            name: params.port.clone(),
            port,
            rx,
            shutdown,
            reader: Some(reader),
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .and_then(|_| self.port.flush())
            .map_err(|e| {
                tracing::error!("Serial write on {} failed: {}", self.name, e);
                Error::from(LinkError::Transport {
                    reason: e.to_string(),
                })
            })
    }

    fn tx_fifo_depth(&self) -> usize {
        self.port.bytes_to_write().map(|n| n as usize).unwrap_or(0)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_into(buf)
    }

    fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    fn clear_rx(&mut self) {
        self.rx.clear();
    }

    fn enable_rx_interrupt(&mut self, enabled: bool) {
        self.rx.set_enabled(enabled);
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
