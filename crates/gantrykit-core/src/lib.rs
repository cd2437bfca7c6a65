//! # GantryKit Core
//!
//! Core types and utilities shared by every GantryKit crate:
//! the unified error taxonomy, decimal rounding used for command and
//! telemetry granularity, and the injectable clock / cancellation
//! primitives that bound every blocking wait.

pub mod clock;
pub mod error;
pub mod units;

pub use clock::{CancelToken, Clock, Deadline, ManualClock, SharedClock, SystemClock, WaitPolicy};
pub use error::{ConnectionError, Error, GcodeError, MotionError, Result, TelemetryError};
pub use units::{round_to, COMMAND_DECIMALS, TELEMETRY_DECIMALS};
