#![allow(dead_code)]

use gantrykit_communication::mock::{MockDevice, MockPortDirectory};
use gantrykit_communication::{DeviceIdentity, ToolActuator, ToolSettings};
use gantrykit_core::{CancelToken, ManualClock, SharedClock};
use gantrykit_motion::{Axis, AxisSettings, Gantry, MotionSettings, PurgeSettings};
use std::sync::Arc;

pub const X_SN: &str = "209D3077484E";
pub const Y_SN: &str = "205D305F484E";
pub const TOOL_SN: &str = "3423931353535120B1E0";

const X_PORT: &str = "/dev/ttyACM0";
const Y_PORT: &str = "/dev/ttyACM1";
const TOOL_PORT: &str = "/dev/ttyUSB0";

/// Telemetry triple as the firmware streams it
pub fn frames(angle: f64, velocity: f64, target: f64) -> Vec<String> {
    vec![
        format!(">9:{}", angle),
        format!(">17:{}", velocity),
        format!(">1:{}", target),
    ]
}

/// Simulated bench: two motor controllers and a tool board
pub struct Rig {
    pub directory: MockPortDirectory,
    pub x: MockDevice,
    pub y: MockDevice,
    pub tool: MockDevice,
    pub clock: Arc<ManualClock>,
    pub cancel: CancelToken,
}

impl Rig {
    pub fn new() -> Self {
        let directory = MockPortDirectory::new();
        let x = directory.add_usb_device(X_PORT, X_SN);
        let y = directory.add_usb_device(Y_PORT, Y_SN);
        let tool = directory.add_usb_device(TOOL_PORT, TOOL_SN);
        for axis in [&x, &y] {
            axis.push_lines(["MOT: Init", ">1:0"]);
        }

        Self {
            directory,
            x,
            y,
            tool,
            clock: Arc::new(ManualClock::new()),
            cancel: CancelToken::new(),
        }
    }

    pub fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn axis_settings(name: &str, serial: &str) -> AxisSettings {
        let mut settings = AxisSettings::new(name, DeviceIdentity::new(serial));
        // The mock counts every queued line as buffered
        settings.backlog_threshold_bytes = 4096;
        settings
    }

    pub fn connect_axis(&self, settings: AxisSettings) -> Axis {
        Axis::connect(
            &self.directory,
            settings,
            self.shared_clock(),
            self.cancel.clone(),
        )
        .unwrap()
    }

    pub fn gantry(&self, purge: PurgeSettings) -> Gantry {
        let x_axis = self.connect_axis(Self::axis_settings("X", X_SN));
        let y_axis = self.connect_axis(Self::axis_settings("Y", Y_SN));
        let tool = ToolActuator::connect(
            &self.directory,
            &ToolSettings::new(DeviceIdentity::new(TOOL_SN)),
            self.clock.as_ref(),
        );

        self.directory.clear_journal();
        self.clock.clear_sleeps();

        Gantry::new(
            x_axis,
            y_axis,
            tool,
            MotionSettings::default(),
            purge,
            self.shared_clock(),
            self.cancel.clone(),
        )
    }

    /// Journal as `X:cmd`, `Y:cmd`, `T:cmd`
    pub fn journal(&self) -> Vec<String> {
        self.directory
            .journal()
            .into_iter()
            .map(|entry| {
                let device = match entry.port_name.as_str() {
                    X_PORT => "X",
                    Y_PORT => "Y",
                    _ => "T",
                };
                format!("{}:{}", device, entry.command)
            })
            .collect()
    }
}

pub fn no_purge() -> PurgeSettings {
    PurgeSettings {
        enabled: false,
        ..PurgeSettings::default()
    }
}
