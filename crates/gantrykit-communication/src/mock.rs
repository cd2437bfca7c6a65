//! In-memory serial devices for testing without hardware.
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPortDirectory`] | [`PortDirectory`] | Fake enumeration; hands out links to registered devices |
//! | [`MockLink`] | [`SerialLink`] | Scripted inbound lines, injected failures |
//! | [`MockDevice`] | - | Test-side handle to inspect and script one device |
//!
//! Every device registered with a directory appends its writes to a shared
//! journal, so tests can assert ordering across devices.
//!
//! # Example
//!
//! ```rust
//! use gantrykit_communication::mock::MockPortDirectory;
//! use gantrykit_communication::{DeviceIdentity, LinkSettings, SerialTransport};
//! use std::time::Duration;
//!
//! let directory = MockPortDirectory::new();
//! let device = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
//!
//! let mut transport = SerialTransport::connect(
//!     &directory,
//!     DeviceIdentity::new("209D3077484E"),
//!     LinkSettings::new(115200, Duration::from_millis(100)),
//! );
//! assert!(transport.send(b"MC2\n").is_sent());
//! assert_eq!(device.commands(), vec!["MC2".to_string()]);
//! ```

use crate::serial::{LinkSettings, PortDirectory, SerialLink, SerialPortInfo};
use gantrykit_core::{ConnectionError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// One write observed by a mock directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Port that received the write
    pub port_name: String,
    /// The written text without its trailing newline
    pub command: String,
}

type Journal = Arc<Mutex<Vec<JournalEntry>>>;

#[derive(Debug, Default)]
struct MockDeviceState {
    inbound: VecDeque<String>,
    written: Vec<String>,
    write_failures: usize,
    read_failures: usize,
    fail_open: bool,
    open: bool,
    open_count: u32,
    reopen_count: u32,
    close_count: u32,
}

/// Test-side handle to a simulated device
#[derive(Debug, Clone)]
pub struct MockDevice {
    port_name: String,
    state: Arc<Mutex<MockDeviceState>>,
    journal: Journal,
}

impl MockDevice {
    fn new(port_name: &str, journal: Journal) -> Self {
        Self {
            port_name: port_name.to_string(),
            state: Arc::new(Mutex::new(MockDeviceState::default())),
            journal,
        }
    }

    /// Port name of the device
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Queue one inbound line
    pub fn push_line(&self, line: impl Into<String>) {
        self.state.lock().inbound.push_back(line.into());
    }

    /// Queue several inbound lines
    pub fn push_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        state.inbound.extend(lines.into_iter().map(Into::into));
    }

    /// Number of inbound lines not yet read
    pub fn pending_lines(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().write_failures = count;
    }

    /// Make the next `count` reads fail
    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().read_failures = count;
    }

    /// Refuse to open
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Raw writes, newline included
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Writes with the trailing newline removed
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .written
            .iter()
            .map(|w| w.trim_end().to_string())
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Whether a link to the device is currently open
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// How many times the device was opened by a directory
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// How many times a link was reopened
    pub fn reopen_count(&self) -> u32 {
        self.state.lock().reopen_count
    }

    /// How many times a link was closed
    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }
}

/// Link handed out by [`MockPortDirectory::open`]
pub struct MockLink {
    device: MockDevice,
}

impl SerialLink for MockLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.device.state.lock();
        if !state.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure"));
        }

        let text = String::from_utf8_lossy(data).to_string();
        self.device.journal.lock().push(JournalEntry {
            port_name: self.device.port_name.clone(),
            command: text.trim_end().to_string(),
        });
        state.written.push(text);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut state = self.device.state.lock();
        if !state.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "port closed"));
        }
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "simulated read failure"));
        }
        Ok(state.inbound.pop_front().map(|l| l.trim().to_string()))
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let state = self.device.state.lock();
        Ok(state.inbound.iter().map(|l| l.len() + 1).sum())
    }

    fn reopen(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        state.reopen_count += 1;
        if state.fail_open {
            state.open = false;
            return Err(io::Error::new(io::ErrorKind::NotFound, "device unplugged"));
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.device.state.lock();
        state.open = false;
        state.close_count += 1;
        Ok(())
    }
}

/// Fake port enumeration
#[derive(Default)]
pub struct MockPortDirectory {
    devices: Mutex<Vec<(SerialPortInfo, MockDevice)>>,
    journal: Journal,
    fail_enumeration: Mutex<bool>,
}

impl MockPortDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return a handle to its device
    pub fn add_device(&self, info: SerialPortInfo) -> MockDevice {
        let device = MockDevice::new(&info.port_name, self.journal.clone());
        self.devices.lock().push((info, device.clone()));
        device
    }

    /// Register a USB port with the given serial number
    pub fn add_usb_device(&self, port_name: &str, serial_number: &str) -> MockDevice {
        self.add_device(
            SerialPortInfo::new(port_name, "USB Mock Serial Port")
                .with_usb_ids(0x0483, 0x5740)
                .with_serial_number(serial_number),
        )
    }

    /// Make enumeration fail
    pub fn fail_enumeration(&self, fail: bool) {
        *self.fail_enumeration.lock() = fail;
    }

    /// Every write to every device, in order
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    /// Forget the journal
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }
}

impl PortDirectory for MockPortDirectory {
    fn ports(&self) -> Result<Vec<SerialPortInfo>> {
        if *self.fail_enumeration.lock() {
            return Err(ConnectionError::Enumeration {
                reason: "simulated enumeration failure".to_string(),
            }
            .into());
        }
        Ok(self
            .devices
            .lock()
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    fn open(&self, port_name: &str, _settings: &LinkSettings) -> Result<Box<dyn SerialLink>> {
        let devices = self.devices.lock();
        let device = devices
            .iter()
            .find(|(info, _)| info.port_name == port_name)
            .map(|(_, device)| device.clone())
            .ok_or_else(|| ConnectionError::FailedToOpen {
                port: port_name.to_string(),
                reason: "no such port".to_string(),
            })?;

        {
            let mut state = device.state.lock();
            if state.fail_open {
                return Err(ConnectionError::FailedToOpen {
                    port: port_name.to_string(),
                    reason: "simulated open failure".to_string(),
                }
                .into());
            }
            state.open = true;
            state.open_count += 1;
        }

        Ok(Box::new(MockLink { device }))
    }
}
