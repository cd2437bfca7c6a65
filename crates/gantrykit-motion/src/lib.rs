//! # GantryKit Motion
//!
//! Motion control on top of the serial plumbing:
//! - [`Axis`]: one pulley-driven linear axis with a telemetry cache, unit
//!   conversion and a homing state machine
//! - [`Gantry`]: two axes and a tool actuator, coordinated by a
//!   dead-reckoning delay, with g-code replay
//!
//! Everything is single-threaded and blocking. Waits go through the
//! injected [`gantrykit_core::Clock`].

pub mod axis;
pub mod gantry;

pub use axis::{
    Axis, AxisSettings, AxisState, HomingSettings, HomingState, PidGains, TelemetryUpdate,
    UpdateEnd,
};
pub use gantry::{Gantry, MotionSettings, PurgeSettings, ReplaySummary};
