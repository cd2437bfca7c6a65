//! # GantryKit Communication
//!
//! Serial plumbing for the motor controllers and the tool actuator:
//! port discovery by hardware identity, line-oriented links with
//! reconnect-on-failure, the motor telemetry codec and command vocabulary,
//! and the binary tool actuator.

pub mod mock;
pub mod motor;
pub mod serial;
pub mod telemetry;
pub mod tool;

pub use motor::MotorCommand;
pub use serial::{
    list_ports, DeviceIdentity, FailurePolicy, LinkSettings, PortDirectory, SendOutcome,
    SerialLink, SerialPortInfo, SerialTransport, SystemPortDirectory,
};
pub use telemetry::{TelemetryCodec, TelemetryField, TelemetryFrame, TelemetryLine};
pub use tool::{ActuatorCommand, ToolActuator, ToolSettings};
