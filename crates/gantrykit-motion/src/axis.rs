//! Single linear axis driven by a rotary motor controller
//!
//! An [`Axis`] owns the serial transport to its controller, a cache of the
//! most recent telemetry, and the homing state machine. Linear positions
//! are converted to motor angles through the pulley radius and quantised
//! to the controller's command resolution (0.01 rad).
//!
//! All state changes driven by telemetry go through a single entry point
//! ([`Axis::update_telemetry`]); commands are fire-and-forget.

use gantrykit_communication::{
    DeviceIdentity, FailurePolicy, LinkSettings, MotorCommand, PortDirectory, SerialTransport,
    TelemetryCodec, TelemetryField, TelemetryFrame, TelemetryLine,
};
use gantrykit_core::units::{mm_to_rad, rad_to_mm};
use gantrykit_core::{
    round_to, CancelToken, Clock, ConnectionError, MotionError, Result, SharedClock, WaitPolicy,
    COMMAND_DECIMALS,
};
use std::time::Duration;

/// Angle-loop PID gains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain
    pub p: f64,
    /// Integral gain
    pub i: f64,
    /// Derivative gain
    pub d: f64,
}

impl PidGains {
    /// Create a gain set
    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d }
    }
}

/// Parameters of the homing procedure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingSettings {
    /// Velocity ceiling while seeking the hard stop
    pub seek_velocity_limit: u32,
    /// Target angle that drives the axis into the hard stop
    pub seek_target_rad: f64,
    /// Wait after issuing the seek before polling for a stall
    pub settle: Duration,
    /// Speed below which the axis counts as stalled
    pub stall_velocity: f64,
    /// Offset from the latched origin to back off the stop
    pub backoff_rad: f64,
    /// Wait after the back-off command
    pub backoff_settle: Duration,
    /// Bounds on the stall polling loop
    pub wait: WaitPolicy,
}

impl Default for HomingSettings {
    fn default() -> Self {
        Self {
            seek_velocity_limit: 20,
            seek_target_rad: -100.0,
            settle: Duration::from_secs(1),
            stall_velocity: 0.02,
            backoff_rad: 0.5,
            backoff_settle: Duration::from_secs(1),
            wait: WaitPolicy::default(),
        }
    }
}

/// Axis configuration
#[derive(Debug, Clone)]
pub struct AxisSettings {
    /// Name used in logs ("X", "Y")
    pub name: String,
    /// Hardware identity of the motor controller
    pub identity: DeviceIdentity,
    /// Link parameters
    pub link: LinkSettings,
    /// Pulley radius in millimetres
    pub radius_mm: f64,
    /// Controller mode sent at start-up (2 = angle control)
    pub control_mode: u8,
    /// Velocity ceiling sent at start-up
    pub initial_velocity_limit: u32,
    /// Gains sent at start-up
    pub pid: PidGains,
    /// Velocity ceiling for normal operation after homing
    pub run_velocity_limit: u32,
    /// Gains for normal operation after homing
    pub run_pid: PidGains,
    /// Buffered bytes above which stale telemetry is discarded
    pub backlog_threshold_bytes: usize,
    /// Text that marks the controller as ready
    pub handshake_sentinel: String,
    /// Bounds on the ready handshake
    pub handshake: WaitPolicy,
    /// Homing procedure
    pub homing: HomingSettings,
    /// How send failures are reported
    pub policy: FailurePolicy,
}

impl AxisSettings {
    /// Settings matching the stock motor controller firmware
    pub fn new(name: impl Into<String>, identity: DeviceIdentity) -> Self {
        Self {
            name: name.into(),
            identity,
            link: LinkSettings::new(115200, Duration::from_millis(100)),
            radius_mm: 6.4,
            control_mode: 2,
            initial_velocity_limit: 20,
            pid: PidGains::new(50.0, 0.0, 1.1),
            run_velocity_limit: 50,
            run_pid: PidGains::new(50.0, 0.0, 1.1),
            backlog_threshold_bytes: 10,
            handshake_sentinel: ">".to_string(),
            handshake: WaitPolicy::default(),
            homing: HomingSettings::default(),
            policy: FailurePolicy::default(),
        }
    }
}

/// Snapshot of an axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisState {
    /// Angle latched by homing; 0 until homed
    pub origin: f64,
    /// `angle * radius`, refreshed with every angle frame
    pub position_mm: f64,
    /// Reported shaft angle (rad)
    pub angle: f64,
    /// Reported velocity (rad/s)
    pub velocity: f64,
    /// Reported commanded target (rad)
    pub angle_target: f64,
    /// Last commanded velocity ceiling
    pub velocity_limit: u32,
    /// Pulley radius (mm)
    pub radius_mm: f64,
}

impl AxisState {
    fn new(radius_mm: f64) -> Self {
        Self {
            origin: 0.0,
            position_mm: 0.0,
            angle: 0.0,
            velocity: 0.0,
            angle_target: 0.0,
            velocity_limit: 0,
            radius_mm,
        }
    }

    fn apply(&mut self, frame: TelemetryFrame) {
        match frame.field {
            TelemetryField::Angle => {
                self.angle = frame.value;
                self.position_mm = rad_to_mm(frame.value, self.radius_mm);
            }
            TelemetryField::Velocity => self.velocity = frame.value,
            TelemetryField::AngleTarget => self.angle_target = frame.value,
        }
    }
}

/// Homing progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingState {
    /// No origin established
    Unhomed,
    /// Driving into the hard stop, waiting for a stall
    Seeking,
    /// Origin latched
    Homed,
}

/// Why a telemetry refresh stopped
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEnd {
    /// Angle, velocity and target were all refreshed
    Complete,
    /// A line without the telemetry sentinel arrived
    NotTelemetry {
        /// The line
        line: String,
    },
    /// The read timed out with nothing pending
    TimedOut,
    /// The transport failed (a reconnect was attempted)
    Failed {
        /// The failure
        reason: String,
    },
}

/// Summary of one [`Axis::update_telemetry`] call
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryUpdate {
    /// An angle frame was applied
    pub angle: bool,
    /// A velocity frame was applied
    pub velocity: bool,
    /// A target frame was applied
    pub angle_target: bool,
    /// Stale lines discarded to bound latency
    pub discarded: usize,
    /// How the call ended
    pub end: UpdateEnd,
}

impl TelemetryUpdate {
    fn new() -> Self {
        Self {
            angle: false,
            velocity: false,
            angle_target: false,
            discarded: 0,
            end: UpdateEnd::Complete,
        }
    }

    /// Check whether every tracked field was refreshed
    pub fn is_complete(&self) -> bool {
        self.angle && self.velocity && self.angle_target
    }

    fn mark(&mut self, field: TelemetryField) {
        match field {
            TelemetryField::Angle => self.angle = true,
            TelemetryField::Velocity => self.velocity = true,
            TelemetryField::AngleTarget => self.angle_target = true,
        }
    }

    fn finish(mut self, end: UpdateEnd) -> Self {
        self.end = end;
        self
    }
}

/// One motor-driven linear axis
pub struct Axis {
    settings: AxisSettings,
    transport: SerialTransport,
    clock: SharedClock,
    cancel: CancelToken,
    state: AxisState,
    homing: HomingState,
}

impl Axis {
    /// Open the controller, wait for it to report ready and send the start-up sequence
    ///
    /// Under [`FailurePolicy::Strict`] a controller that cannot be found is
    /// an error. Under [`FailurePolicy::Lenient`] the axis is returned
    /// without a handle and every command becomes a logged no-op.
    pub fn connect(
        directory: &dyn PortDirectory,
        settings: AxisSettings,
        clock: SharedClock,
        cancel: CancelToken,
    ) -> Result<Self> {
        let mut transport =
            SerialTransport::connect(directory, settings.identity.clone(), settings.link);

        if transport.is_connected() {
            wait_for_ready(&mut transport, &settings, clock.as_ref(), &cancel)?;
        } else if settings.policy == FailurePolicy::Strict {
            return Err(ConnectionError::NotConnected {
                identity: settings.identity.to_string(),
            }
            .into());
        } else {
            tracing::warn!("Axis {} has no controller; commands will be ignored", settings.name);
        }

        let mut axis = Self {
            state: AxisState::new(settings.radius_mm),
            settings,
            transport,
            clock,
            cancel,
            homing: HomingState::Unhomed,
        };
        axis.init_motion()?;
        Ok(axis)
    }

    fn init_motion(&mut self) -> Result<()> {
        let pid = self.settings.pid;
        let commands = [
            MotorCommand::VelocityLimit(self.settings.initial_velocity_limit),
            MotorCommand::ControlMode(self.settings.control_mode),
            MotorCommand::PidP(pid.p),
            MotorCommand::PidI(pid.i),
            MotorCommand::PidD(pid.d),
            MotorCommand::Target(0.0),
        ];
        for command in commands {
            self.send(command)?;
        }
        self.state.velocity_limit = self.settings.initial_velocity_limit;
        Ok(())
    }

    /// Send one motor command
    pub fn send(&mut self, command: MotorCommand) -> Result<()> {
        tracing::debug!("{} <- {}", self.settings.name, command);
        let outcome = self.transport.send(command.encode().as_bytes());
        outcome.into_result(self.settings.policy, self.transport.identity())
    }

    /// Refresh the telemetry cache
    ///
    /// Stale buffered lines beyond the backlog threshold are discarded
    /// first. Lines are then read until angle, velocity and target have
    /// each been refreshed, or until a non-telemetry line, a read timeout
    /// or a transport failure ends the call early. Malformed frames and
    /// untracked field codes are skipped.
    pub fn update_telemetry(&mut self) -> TelemetryUpdate {
        let mut update = TelemetryUpdate::new();

        while !update.is_complete() {
            if let Err(e) = self.drain_backlog(&mut update) {
                return update.finish(UpdateEnd::Failed {
                    reason: e.to_string(),
                });
            }

            let line = match self.transport.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => return update.finish(UpdateEnd::TimedOut),
                Err(e) => {
                    return update.finish(UpdateEnd::Failed {
                        reason: e.to_string(),
                    })
                }
            };

            match TelemetryCodec::decode(&line) {
                Ok(TelemetryLine::Frame(frame)) => {
                    self.state.apply(frame);
                    update.mark(frame.field);
                }
                Ok(TelemetryLine::Unrecognized { .. }) => {}
                Ok(TelemetryLine::NotTelemetry) => {
                    return update.finish(UpdateEnd::NotTelemetry { line });
                }
                Err(e) => tracing::debug!("{}: skipping {}", self.settings.name, e),
            }
        }

        update.finish(UpdateEnd::Complete)
    }

    fn drain_backlog(&mut self, update: &mut TelemetryUpdate) -> Result<()> {
        while self.transport.bytes_to_read()? > self.settings.backlog_threshold_bytes {
            match self.transport.read_line()? {
                Some(_) => update.discarded += 1,
                None => break,
            }
        }
        Ok(())
    }

    /// Set the velocity ceiling
    pub fn set_velocity_limit(&mut self, limit: u32) -> Result<()> {
        self.state.velocity_limit = limit;
        self.send(MotorCommand::VelocityLimit(limit))
    }

    /// Set the angle-loop gains
    pub fn set_pid(&mut self, gains: PidGains) -> Result<()> {
        self.send(MotorCommand::PidP(gains.p))?;
        self.send(MotorCommand::PidI(gains.i))?;
        self.send(MotorCommand::PidD(gains.d))
    }

    /// Apply the velocity ceiling and gains for normal operation
    pub fn apply_run_profile(&mut self) -> Result<()> {
        self.set_velocity_limit(self.settings.run_velocity_limit)?;
        self.set_pid(self.settings.run_pid)
    }

    /// Command an angle relative to the origin
    ///
    /// A target that is not finite is rejected before anything is written.
    pub fn set_target_angle_rad(&mut self, angle_rad: f64) -> Result<()> {
        let target = self.target_angle(angle_rad)?;
        self.send(MotorCommand::Target(target))
    }

    /// The absolute, quantised angle a relative target maps to
    pub fn target_angle(&self, angle_rad: f64) -> Result<f64> {
        let target = round_to(self.state.origin + angle_rad, COMMAND_DECIMALS);
        if !target.is_finite() {
            return Err(MotionError::TargetOutOfRange {
                axis: self.settings.name.clone(),
                target,
            }
            .into());
        }
        Ok(target)
    }

    /// Command a linear position relative to the origin
    ///
    /// Returns once the command is written, not when the axis arrives.
    pub fn set_target_pos_mm(&mut self, position_mm: f64) -> Result<()> {
        self.set_target_angle_rad(self.mm_to_rad(position_mm))
    }

    /// Convert a linear distance to a motor angle at command resolution
    pub fn mm_to_rad(&self, mm: f64) -> f64 {
        mm_to_rad(mm, self.settings.radius_mm)
    }

    /// Drive into the hard stop and latch the origin where the axis stalls
    ///
    /// Only a velocity frame received during the current poll can trigger
    /// the latch. Returns the latched origin. Without a homing timeout a
    /// motor that never stalls keeps this call polling until the cancel
    /// token fires.
    pub fn find_home(&mut self) -> Result<f64> {
        let homing = self.settings.homing;
        self.homing = HomingState::Unhomed;
        self.state.origin = 0.0;

        self.update_telemetry();
        self.set_velocity_limit(homing.seek_velocity_limit)?;
        self.send(MotorCommand::Target(homing.seek_target_rad))?;
        self.homing = HomingState::Seeking;
        tracing::info!("Homing {}: seeking hard stop", self.settings.name);

        let clock = self.clock.clone();
        let cancel = self.cancel.clone();
        clock.sleep(homing.settle);

        let deadline = homing.wait.start(clock.as_ref(), &cancel);
        loop {
            if let Err(e) = deadline.check(|timeout_ms| MotionError::HomingTimeout { timeout_ms }) {
                self.homing = HomingState::Unhomed;
                return Err(e);
            }

            let update = self.update_telemetry();
            if update.velocity && self.state.velocity.abs() < homing.stall_velocity {
                break;
            }
            if !update.velocity {
                deadline.pause();
            }
        }

        self.state.origin = self.state.angle;
        self.homing = HomingState::Homed;
        tracing::info!("{} origin set to {}", self.settings.name, self.state.origin);

        self.set_target_angle_rad(homing.backoff_rad)?;
        clock.sleep(homing.backoff_settle);
        Ok(self.state.origin)
    }

    /// Snapshot of the cached state
    pub fn state(&self) -> AxisState {
        self.state
    }

    /// Current homing state
    pub fn homing_state(&self) -> HomingState {
        self.homing
    }

    /// Last commanded velocity ceiling
    pub fn velocity_limit(&self) -> u32 {
        self.state.velocity_limit
    }

    /// Axis name
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Axis settings
    pub fn settings(&self) -> &AxisSettings {
        &self.settings
    }

    /// Check whether the controller port is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// The underlying transport
    pub fn transport(&self) -> &SerialTransport {
        &self.transport
    }

    /// Close the controller port
    pub fn close(&mut self) {
        self.transport.close();
    }
}

fn wait_for_ready(
    transport: &mut SerialTransport,
    settings: &AxisSettings,
    clock: &dyn Clock,
    cancel: &CancelToken,
) -> Result<()> {
    let port = transport.port_name().unwrap_or_default().to_string();
    tracing::info!("Listening on {} for '{}'", port, settings.handshake_sentinel);

    let deadline = settings.handshake.start(clock, cancel);
    loop {
        deadline.check(|timeout_ms| MotionError::HandshakeTimeout { timeout_ms })?;

        match transport.read_line() {
            Ok(Some(line)) => {
                tracing::debug!("Received from {}: {}", port, line);
                if line.contains(settings.handshake_sentinel.as_str()) {
                    tracing::info!("{} ready on {}", settings.name, port);
                    return Ok(());
                }
            }
            Ok(None) => deadline.pause(),
            Err(e) => {
                tracing::warn!("{}: {}", settings.name, e);
                deadline.pause();
            }
        }
    }
}
