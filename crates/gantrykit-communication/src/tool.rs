//! Tool actuator
//!
//! A binary on/off device (relay board running custom firmware) reached
//! over its own serial link. Commands are fire-and-forget; nothing is read
//! back.

use crate::serial::{DeviceIdentity, FailurePolicy, LinkSettings, PortDirectory, SerialTransport};
use gantrykit_core::{Clock, Result};
use std::time::Duration;

/// Actuator firmware command set
///
/// Unrelated to the g-code spindle words `M3 S1` / `M5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Energise the tool
    On,
    /// De-energise the tool
    Off,
}

impl ActuatorCommand {
    /// Wire form, including the trailing newline
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON\n",
            Self::Off => "OFF\n",
        }
    }
}

/// Tool actuator connection settings
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Hardware identity of the actuator board
    pub identity: DeviceIdentity,
    /// Link parameters
    pub link: LinkSettings,
    /// Boot time of the board after the port opens
    pub settle: Duration,
    /// How send failures are reported
    pub policy: FailurePolicy,
}

impl ToolSettings {
    /// Settings with the actuator firmware's defaults (9600 baud, 1 s reads, 2 s boot)
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            link: LinkSettings::new(9600, Duration::from_secs(1)),
            settle: Duration::from_secs(2),
            policy: FailurePolicy::default(),
        }
    }
}

/// Binary tool actuator
pub struct ToolActuator {
    transport: SerialTransport,
    policy: FailurePolicy,
}

impl ToolActuator {
    /// Open the actuator's port and wait for the board to boot
    ///
    /// Opening the port resets the board, so the settle delay applies even
    /// when no port was found.
    pub fn connect(directory: &dyn PortDirectory, settings: &ToolSettings, clock: &dyn Clock) -> Self {
        let transport =
            SerialTransport::connect(directory, settings.identity.clone(), settings.link);
        clock.sleep(settings.settle);

        Self {
            transport,
            policy: settings.policy,
        }
    }

    /// Turn the tool on
    pub fn on(&mut self) -> Result<()> {
        self.send(ActuatorCommand::On)
    }

    /// Turn the tool off
    pub fn off(&mut self) -> Result<()> {
        self.send(ActuatorCommand::Off)
    }

    /// Send one actuator command
    pub fn send(&mut self, command: ActuatorCommand) -> Result<()> {
        tracing::debug!("Tool command {:?}", command);
        let outcome = self.transport.send(command.as_str().as_bytes());
        outcome.into_result(self.policy, self.transport.identity())
    }

    /// Check whether the actuator port is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// The underlying transport
    pub fn transport(&self) -> &SerialTransport {
        &self.transport
    }

    /// Turn the tool off and close the port
    pub fn shutdown(&mut self) {
        if let Err(e) = self.off() {
            tracing::warn!("Failed to turn tool off during shutdown: {}", e);
        }
        self.transport.close();
    }
}
