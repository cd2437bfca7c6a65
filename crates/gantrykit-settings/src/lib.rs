//! GantryKit Settings Crate
//!
//! Loads, validates and saves the machine configuration file and turns it
//! into the settings structs consumed by the communication and motion crates.

pub mod config;
pub mod error;

pub use config::{
    AxisConfig, HandshakeConfig, HomingConfig, MachineConfig, MotionConfig, PidConfig,
    PurgeConfig, ToolConfig,
};
pub use error::{SettingsError, SettingsResult};
