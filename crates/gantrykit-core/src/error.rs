//! Error handling for GantryKit
//!
//! Provides error types for all layers of the controller:
//! - Connection errors (port discovery, serial I/O, dropped commands)
//! - Telemetry errors (malformed status frames)
//! - Motion errors (coordination hazards, bounded waits, cancellation)
//! - G-Code errors (replay and emission)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents errors related to the serial links that drive the motor
/// controllers and the tool actuator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// No enumerated port carries the device identity
    #[error("No serial port matches device identity {identity}")]
    DeviceNotFound {
        /// The identity substring that was searched for.
        identity: String,
    },

    /// A matching port was found but could not be opened
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// The device has no open serial handle
    #[error("Device {identity} is not connected")]
    NotConnected {
        /// The identity of the device.
        identity: String,
    },

    /// A command was lost to a transport failure (the link was reconnected, the command was not retried)
    #[error("Command to {identity} dropped: {reason}")]
    CommandDropped {
        /// The identity of the device.
        identity: String,
        /// The underlying I/O failure.
        reason: String,
    },

    /// Serial port enumeration failed
    #[error("Failed to enumerate serial ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },

    /// I/O error on an open link
    #[error("Serial I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Telemetry error type
///
/// Produced when a line carries the telemetry sentinel but cannot be decoded.
/// Callers skip the line and keep reading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// The frame has no `:` between field code and payload
    #[error("Telemetry frame without field separator: {line}")]
    MissingSeparator {
        /// The offending line.
        line: String,
    },

    /// The payload is not a number
    #[error("Telemetry frame {line} has a non-numeric payload '{value}'")]
    InvalidValue {
        /// The offending line.
        line: String,
        /// The payload that failed to parse.
        value: String,
    },
}

/// Motion error type
///
/// Represents failures of the motion layer: arithmetic hazards in the
/// dead-reckoning estimate and bounded waits that ran out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// The velocity ceiling leaves no headroom above the safety margin
    #[error("Velocity limit {velocity_limit} is at or below the coordination margin {margin}")]
    VelocityAtOrBelowMargin {
        /// The axis velocity limit.
        velocity_limit: f64,
        /// The configured margin.
        margin: f64,
    },

    /// The travel estimate does not fit in a duration
    #[error("Estimated travel time {seconds}s is out of range")]
    DelayOutOfRange {
        /// The raw estimate in seconds.
        seconds: f64,
    },

    /// A target angle is not a finite number
    #[error("Target angle {target} for axis {axis} is not finite")]
    TargetOutOfRange {
        /// The axis name.
        axis: String,
        /// The rejected target in radians.
        target: f64,
    },

    /// The device-ready handshake did not arrive in time
    #[error("Device handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The axis never stalled against its hard stop
    #[error("Homing timed out after {timeout_ms}ms")]
    HomingTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The operation observed a cancellation request
    #[error("Operation cancelled")]
    Cancelled,
}

/// G-Code error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// A word could not be interpreted
    #[error("Invalid word '{word}' at line {line_number}")]
    InvalidWord {
        /// The line number where the word was found.
        line_number: u32,
        /// The offending word.
        word: String,
    },

    /// The program file could not be read or written
    #[error("G-Code file error: {reason}")]
    File {
        /// The reason for the file error.
        reason: String,
    },
}

/// Main error type for GantryKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Telemetry error
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Motion(MotionError::HandshakeTimeout { .. })
                | Error::Motion(MotionError::HomingTimeout { .. })
        )
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Motion(MotionError::Cancelled))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::DeviceNotFound {
            identity: "209D3077484E".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No serial port matches device identity 209D3077484E"
        );

        let err = ConnectionError::CommandDropped {
            identity: "tool".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.to_string(), "Command to tool dropped: broken pipe");
    }

    #[test]
    fn test_error_classification() {
        let err: Error = MotionError::HomingTimeout { timeout_ms: 500 }.into();
        assert!(err.is_timeout());
        assert!(!err.is_connection_error());

        let err: Error = MotionError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());

        let err: Error = ConnectionError::NotConnected {
            identity: "x".to_string(),
        }
        .into();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_margin_error_message() {
        let err = MotionError::VelocityAtOrBelowMargin {
            velocity_limit: 10.0,
            margin: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "Velocity limit 10 is at or below the coordination margin 10"
        );
    }
}
