//! Motor controller telemetry parsing
//!
//! The motor firmware streams status frames of the form `><code>:<value>`,
//! interleaved with free-form advisory text. This module decodes one line
//! at a time and performs no I/O.

use gantrykit_core::{round_to, TelemetryError, TELEMETRY_DECIMALS};
use std::fmt;

/// First character of every telemetry frame
pub const TELEMETRY_SENTINEL: char = '>';

/// Tracked telemetry fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryField {
    /// Shaft angle in radians (code `9`)
    Angle,
    /// Shaft velocity in rad/s (code `17`)
    Velocity,
    /// Echo of the commanded target angle (code `1`)
    AngleTarget,
}

impl TelemetryField {
    /// All tracked fields
    pub const ALL: [TelemetryField; 3] = [
        TelemetryField::Angle,
        TelemetryField::Velocity,
        TelemetryField::AngleTarget,
    ];

    /// Look up a field by its wire code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "9" => Some(Self::Angle),
            "17" => Some(Self::Velocity),
            "1" => Some(Self::AngleTarget),
            _ => None,
        }
    }

    /// Wire code of the field
    pub fn code(&self) -> &'static str {
        match self {
            Self::Angle => "9",
            Self::Velocity => "17",
            Self::AngleTarget => "1",
        }
    }
}

/// One decoded field update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    /// Which field changed
    pub field: TelemetryField,
    /// New value, rounded to three decimals
    pub value: f64,
}

impl TelemetryFrame {
    /// Create a frame, rounding the value to telemetry precision
    pub fn new(field: TelemetryField, value: f64) -> Self {
        Self {
            field,
            value: round_to(value, TELEMETRY_DECIMALS),
        }
    }
}

impl fmt::Display for TelemetryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", TELEMETRY_SENTINEL, self.field.code(), self.value)
    }
}

/// Classification of one inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryLine {
    /// The line does not start with the sentinel
    NotTelemetry,
    /// A frame for a field this controller does not track
    Unrecognized {
        /// The field code
        code: String,
    },
    /// A tracked field update
    Frame(TelemetryFrame),
}

/// Telemetry line codec
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryCodec;

impl TelemetryCodec {
    /// Decode one raw line
    ///
    /// Returns an error only for sentinel lines whose payload is malformed;
    /// callers skip those and keep reading. Whitespace around the code and
    /// the value is ignored, so `> 1 : 15.63` decodes as an angle target.
    pub fn decode(line: &str) -> Result<TelemetryLine, TelemetryError> {
        let line = line.trim();
        let Some(content) = line.strip_prefix(TELEMETRY_SENTINEL) else {
            return Ok(TelemetryLine::NotTelemetry);
        };

        let (code, value_str) =
            content
                .trim()
                .split_once(':')
                .ok_or_else(|| TelemetryError::MissingSeparator {
                    line: line.to_string(),
                })?;

        let value = value_str
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TelemetryError::InvalidValue {
                line: line.to_string(),
                value: value_str.trim().to_string(),
            })?;

        let code = code.trim();
        Ok(match TelemetryField::from_code(code) {
            Some(field) => TelemetryLine::Frame(TelemetryFrame::new(field, value)),
            None => TelemetryLine::Unrecognized {
                code: code.to_string(),
            },
        })
    }

    /// Encode a frame the way the firmware prints it
    pub fn encode(frame: &TelemetryFrame) -> String {
        frame.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_tracked_fields() {
        assert_eq!(
            TelemetryCodec::decode(">9:1.23456").unwrap(),
            TelemetryLine::Frame(TelemetryFrame {
                field: TelemetryField::Angle,
                value: 1.235
            })
        );
        assert_eq!(
            TelemetryCodec::decode(">17:-0.0149\r\n").unwrap(),
            TelemetryLine::Frame(TelemetryFrame {
                field: TelemetryField::Velocity,
                value: -0.015
            })
        );
        assert_eq!(
            TelemetryCodec::decode("> 1 : 15.63").unwrap(),
            TelemetryLine::Frame(TelemetryFrame {
                field: TelemetryField::AngleTarget,
                value: 15.63
            })
        );
    }

    #[test]
    fn test_decode_ignores_advisory_text() {
        assert_eq!(
            TelemetryCodec::decode("MOT: Init").unwrap(),
            TelemetryLine::NotTelemetry
        );
        assert_eq!(TelemetryCodec::decode("").unwrap(), TelemetryLine::NotTelemetry);
    }

    #[test]
    fn test_decode_unrecognized_code() {
        assert_eq!(
            TelemetryCodec::decode(">3:12.5").unwrap(),
            TelemetryLine::Unrecognized {
                code: "3".to_string()
            }
        );
    }

    #[test]
    fn test_decode_malformed_payloads() {
        assert!(matches!(
            TelemetryCodec::decode(">9"),
            Err(TelemetryError::MissingSeparator { .. })
        ));
        assert!(matches!(
            TelemetryCodec::decode(">9:abc"),
            Err(TelemetryError::InvalidValue { .. })
        ));
        assert!(matches!(
            TelemetryCodec::decode(">"),
            Err(TelemetryError::MissingSeparator { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_frames_round_trip(value in -1.0e4f64..1.0e4, idx in 0usize..3) {
            let frame = TelemetryFrame::new(TelemetryField::ALL[idx], value);
            let decoded = TelemetryCodec::decode(&TelemetryCodec::encode(&frame)).unwrap();
            prop_assert_eq!(decoded, TelemetryLine::Frame(frame));
            prop_assert!((frame.value - value).abs() <= 0.0005 + 1e-9);
        }

        #[test]
        fn prop_lines_without_sentinel_are_not_telemetry(line in "[^>\\s][^\n]*") {
            prop_assert_eq!(TelemetryCodec::decode(&line).unwrap(), TelemetryLine::NotTelemetry);
        }
    }
}
