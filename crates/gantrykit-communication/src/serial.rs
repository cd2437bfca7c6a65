//! Serial port communication implementation
//!
//! Provides the transport that owns one physical serial connection to a
//! motor controller or the tool actuator.
//!
//! Supports:
//! - Port enumeration through an injectable [`PortDirectory`]
//! - Binding to a device by hardware-ID substring ([`DeviceIdentity`])
//! - Newline-terminated writes with flush
//! - Line reads bounded by the link's read timeout
//! - Close-and-reopen recovery after an I/O failure
//!
//! When several ports carry the identity, the first in enumeration order
//! wins. Enumeration order is not guaranteed stable across OS or driver
//! versions; pick identities that are unique on the host.

use gantrykit_core::{ConnectionError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Stable hardware identifier substring (usually a USB serial number)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Create a new identity
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// The identity text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a port's hardware ID carries this identity
    pub fn matches(&self, hardware_id: &str) -> bool {
        !self.0.is_empty() && hardware_id.contains(&self.0)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB STMicroelectronics Virtual COM Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

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
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }

    /// Hardware ID string that identities are matched against
    ///
    /// USB ports read `USB VID:PID=0483:5740 SER=209D3077484E`; other ports
    /// fall back to their description.
    pub fn hardware_id(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => {
                let mut id = format!("USB VID:PID={:04X}:{:04X}", vid, pid);
                if let Some(serial) = &self.serial_number {
                    id.push_str(" SER=");
                    id.push_str(serial);
                }
                id
            }
            _ => self.description.clone(),
        }
    }
}

/// Parameters for opening a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Bound on a single blocking read
    pub read_timeout: Duration,
}

impl LinkSettings {
    /// Create link settings
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

/// An open, line-oriented serial connection
pub trait SerialLink: Send {
    /// Write all bytes and flush
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read one newline-terminated line, trimmed; `None` when the read timed out
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Number of inbound bytes already buffered
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Close and reopen the same port path
    fn reopen(&mut self) -> io::Result<()>;

    /// Close the port
    fn close(&mut self) -> io::Result<()>;
}

/// Source of serial ports
///
/// Production code uses [`SystemPortDirectory`]; tests substitute
/// [`crate::mock::MockPortDirectory`].
pub trait PortDirectory: Send + Sync {
    /// Enumerate ports in the order the platform reports them
    fn ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Open a port by name
    fn open(&self, port_name: &str, settings: &LinkSettings) -> Result<Box<dyn SerialLink>>;
}

/// Port directory backed by the `serialport` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortDirectory;

impl PortDirectory for SystemPortDirectory {
    fn ports(&self) -> Result<Vec<SerialPortInfo>> {
        match serialport::available_ports() {
            Ok(ports) => Ok(ports.iter().map(port_info_from).collect()),
            Err(e) => {
                tracing::error!("Failed to enumerate serial ports: {}", e);
                Err(ConnectionError::Enumeration {
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn open(&self, port_name: &str, settings: &LinkSettings) -> Result<Box<dyn SerialLink>> {
        let link = SystemSerialLink::open(port_name, *settings)?;
        Ok(Box::new(link))
    }
}

fn port_info_from(port: &serialport::SerialPortInfo) -> SerialPortInfo {
    let info = SerialPortInfo::new(&port.port_name, get_port_description(port));

    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            let mut info = info.with_usb_ids(usb_info.vid, usb_info.pid);
            if let Some(ref mfg) = usb_info.manufacturer {
                info = info.with_manufacturer(mfg);
            }
            if let Some(ref serial) = usb_info.serial_number {
                info = info.with_serial_number(serial);
            }
            info
        }
        _ => info,
    }
}

/// Get a user-friendly description for a port
fn get_port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial link using the serialport crate
pub struct SystemSerialLink {
    port_name: String,
    settings: LinkSettings,
    port: Option<Box<dyn serialport::SerialPort>>,
    pending: Vec<u8>,
}

impl SystemSerialLink {
    /// Open a serial port with the given parameters
    pub fn open(port_name: &str, settings: LinkSettings) -> Result<Self> {
        let port = Self::open_port(port_name, &settings).map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", port_name, e);
            Error::from(ConnectionError::FailedToOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            })
        })?;

        Ok(Self {
            port_name: port_name.to_string(),
            settings,
            port: Some(port),
            pending: Vec::new(),
        })
    }

    fn open_port(
        port_name: &str,
        settings: &LinkSettings,
    ) -> serialport::Result<Box<dyn serialport::SerialPort>> {
        serialport::new(port_name, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.port_name),
            )
        })
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

impl SerialLink for SystemSerialLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            match self.port_mut()?.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let buffered = self.port_mut()?.bytes_to_read().map_err(io::Error::from)?;
        Ok(self.pending.len() + buffered as usize)
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.port = None;
        self.pending.clear();
        let port = Self::open_port(&self.port_name, &self.settings).map_err(io::Error::from)?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.port = None;
        self.pending.clear();
        Ok(())
    }
}

/// What to do when a command cannot be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the failure to the caller
    #[default]
    Strict,
    /// Log the failure and carry on as if the command was sent
    Lenient,
}

/// Result of a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written and flushed
    Sent,
    /// No open handle; nothing was written
    Skipped,
    /// The write failed; the link was reconnected and the command is lost
    Failed {
        /// The I/O failure
        reason: String,
    },
}

impl SendOutcome {
    /// Check if the bytes reached the port
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }

    /// Convert to a result according to `policy`
    pub fn into_result(self, policy: FailurePolicy, identity: &DeviceIdentity) -> Result<()> {
        let err = match self {
            SendOutcome::Sent => return Ok(()),
            SendOutcome::Skipped => ConnectionError::NotConnected {
                identity: identity.to_string(),
            },
            SendOutcome::Failed { reason } => ConnectionError::CommandDropped {
                identity: identity.to_string(),
                reason,
            },
        };

        match policy {
            FailurePolicy::Strict => Err(err.into()),
            FailurePolicy::Lenient => {
                tracing::warn!("{}", err);
                Ok(())
            }
        }
    }
}

/// One physical serial connection bound to a device identity
pub struct SerialTransport {
    identity: DeviceIdentity,
    settings: LinkSettings,
    port_name: Option<String>,
    link: Option<Box<dyn SerialLink>>,
    reconnects: u32,
}

impl SerialTransport {
    /// Resolve `identity` against the directory and open the first matching port
    ///
    /// A missing device is not an error here: the transport is returned
    /// without a handle and every send reports [`SendOutcome::Skipped`].
    pub fn connect(
        directory: &dyn PortDirectory,
        identity: DeviceIdentity,
        settings: LinkSettings,
    ) -> Self {
        let (port_name, link) = match Self::resolve(directory, &identity, &settings) {
            Ok((port_name, link)) => {
                tracing::info!(
                    "Connected {} on {} at {} baud",
                    identity,
                    port_name,
                    settings.baud_rate
                );
                (Some(port_name), Some(link))
            }
            Err(e) => {
                tracing::warn!("{}", e);
                (None, None)
            }
        };

        Self {
            identity,
            settings,
            port_name,
            link,
            reconnects: 0,
        }
    }

    fn resolve(
        directory: &dyn PortDirectory,
        identity: &DeviceIdentity,
        settings: &LinkSettings,
    ) -> Result<(String, Box<dyn SerialLink>)> {
        let ports = directory.ports()?;
        for port in &ports {
            tracing::debug!(
                "{}: {} [{}]",
                port.port_name,
                port.description,
                port.hardware_id()
            );
        }

        for port in ports.iter().filter(|p| identity.matches(&p.hardware_id())) {
            match directory.open(&port.port_name, settings) {
                Ok(link) => return Ok((port.port_name.clone(), link)),
                Err(e) => tracing::warn!("Failed to connect to {}: {}", identity, e),
            }
        }

        Err(ConnectionError::DeviceNotFound {
            identity: identity.to_string(),
        }
        .into())
    }

    /// The device identity this transport is bound to
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// The link settings used for (re)opening
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Name of the resolved port, if any
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Check whether a handle is held
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Number of reconnects performed so far
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects
    }

    /// Write and flush `data`
    ///
    /// A write failure triggers one [`reconnect`](Self::reconnect); the
    /// failed bytes are not resent.
    pub fn send(&mut self, data: &[u8]) -> SendOutcome {
        let Some(link) = self.link.as_mut() else {
            tracing::warn!("Serial connection to {} is not open", self.identity);
            return SendOutcome::Skipped;
        };

        let result = link.write_all(data);
        match result {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                tracing::warn!("Write to {} failed: {}", self.identity, e);
                if let Err(reconnect_err) = self.reconnect() {
                    tracing::error!("{}", reconnect_err);
                }
                SendOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Read one line, `None` on timeout
    ///
    /// A read failure triggers one reconnect and is reported to the caller.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let result = self.link_mut()?.read_line();
        match result {
            Ok(line) => Ok(line),
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", self.identity, e);
                if let Err(reconnect_err) = self.reconnect() {
                    tracing::error!("{}", reconnect_err);
                }
                Err(ConnectionError::Io {
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    /// Number of inbound bytes already buffered
    pub fn bytes_to_read(&mut self) -> Result<usize> {
        self.link_mut()?.bytes_to_read().map_err(|e| {
            ConnectionError::Io {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Close and reopen the same port path
    ///
    /// The identity is not re-resolved; the path is assumed still valid.
    pub fn reconnect(&mut self) -> Result<()> {
        let port = self.port_name.clone().unwrap_or_default();
        tracing::warn!("Resetting serial connection {} ({})", self.identity, port);
        let link = self.link_mut()?;
        let reopened = link.reopen();
        self.reconnects += 1;
        reopened.map_err(|e| {
            ConnectionError::FailedToOpen {
                port,
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Close the connection; later sends are skipped
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close() {
                tracing::warn!("Error closing {}: {}", self.identity, e);
            }
            tracing::info!("Closed connection to {}", self.identity);
        }
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>> {
        match self.link.as_mut() {
            Some(link) => Ok(link),
            None => Err(ConnectionError::NotConnected {
                identity: self.identity.to_string(),
            }
            .into()),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// List ports with their hardware IDs
pub fn list_ports(directory: &dyn PortDirectory) -> Result<Vec<(SerialPortInfo, String)>> {
    Ok(directory
        .ports()?
        .into_iter()
        .map(|port| {
            let hardware_id = port.hardware_id();
            (port, hardware_id)
        })
        .collect())
}
