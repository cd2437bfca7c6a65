//! # GantryKit
//!
//! Serial motion controller for a two-axis hobby gantry:
//! - Two pulley-driven axes, each behind its own motor controller
//! - A binary tool actuator (relay board) on a third serial link
//! - Homing against mechanical hard stops
//! - Dead-reckoning coordinated XY moves and g-code replay
//!
//! ## Architecture
//!
//! GantryKit is organized as a workspace with multiple crates:
//!
//! 1. **gantrykit-core** - Errors, rounding, clocks, cancellation
//! 2. **gantrykit-communication** - Serial transport, telemetry codec, tool actuator
//! 3. **gantrykit-gcode** - G-code emission and replay parsing
//! 4. **gantrykit-motion** - Axis homing and coordinated gantry motion
//! 5. **gantrykit-settings** - Machine configuration file
//! 6. **gantrykit** - Main binary that integrates all crates

pub use gantrykit_communication::{
    list_ports, DeviceIdentity, FailurePolicy, PortDirectory, SerialTransport,
    SystemPortDirectory, ToolActuator,
};
pub use gantrykit_core::{CancelToken, Clock, Error, Result, SharedClock, SystemClock};
pub use gantrykit_gcode::{GcodeWriter, Toolpath};
pub use gantrykit_motion::{Axis, Gantry, ReplaySummary};
pub use gantrykit_settings::MachineConfig;

/// Initialize logging with tracing
///
/// `RUST_LOG` overrides the default level; `verbose` raises the default
/// from `info` to `debug`.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Cancel `cancel` when the process receives Ctrl+C
///
/// Blocking loops observe the token and unwind, so the caller still gets
/// to turn the tool off. Can only be installed once per process.
pub fn install_interrupt_handler(cancel: &CancelToken) -> anyhow::Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupted; stopping");
        cancel.cancel();
    })?;
    Ok(())
}

/// Connect, run `f`, and shut the gantry down whatever `f` returned
pub fn with_gantry<T, E>(
    directory: &dyn PortDirectory,
    config: &MachineConfig,
    clock: SharedClock,
    cancel: CancelToken,
    f: impl FnOnce(&mut Gantry) -> std::result::Result<T, E>,
) -> std::result::Result<T, E>
where
    E: From<Error>,
{
    let mut gantry = connect_gantry(directory, config, clock, cancel)?;
    let result = f(&mut gantry);
    gantry.shutdown();
    result
}

/// Build the gantry described by `config`
///
/// Connects the tool first (its board needs a boot delay), then X and Y.
/// Each axis blocks until its controller reports ready.
pub fn connect_gantry(
    directory: &dyn PortDirectory,
    config: &MachineConfig,
    clock: SharedClock,
    cancel: CancelToken,
) -> Result<Gantry> {
    let tool = ToolActuator::connect(directory, &config.tool_settings(), clock.as_ref());
    let x_axis = Axis::connect(
        directory,
        config.x_axis_settings(),
        clock.clone(),
        cancel.clone(),
    )?;
    let y_axis = Axis::connect(
        directory,
        config.y_axis_settings(),
        clock.clone(),
        cancel.clone(),
    )?;

    Ok(Gantry::new(
        x_axis,
        y_axis,
        tool,
        config.motion_settings(),
        config.purge_settings(),
        clock,
        cancel,
    ))
}
