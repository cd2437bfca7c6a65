//! Two-axis gantry with a tool actuator
//!
//! Moves are coordinated open-loop: both axis targets are sent, then the
//! gantry sleeps for the longer of the two per-axis travel estimates
//! (`|delta rad| / (velocity limit - margin)`). Telemetry is not consulted
//! to confirm arrival.

use crate::axis::Axis;
use gantrykit_communication::ToolActuator;
use gantrykit_core::{CancelToken, GcodeError, MotionError, Result, SharedClock};
use gantrykit_gcode::{parse_line, LineParse, ReplayCommand};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

/// Coordination parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    /// Subtracted from each velocity limit before estimating travel time
    pub velocity_margin: f64,
    /// Multiplier applied to every estimate
    pub delay_scale: f64,
    /// Wait between homing and applying the run profile
    pub post_home_settle: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            velocity_margin: 10.0,
            delay_scale: 1.0,
            post_home_settle: Duration::from_secs(1),
        }
    }
}

/// Nozzle purge run before every replay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurgeSettings {
    /// Run the purge at all
    pub enabled: bool,
    /// Priming position X (mm)
    pub x_mm: f64,
    /// Priming position Y (mm)
    pub y_mm: f64,
    /// How long the tool stays on
    pub duration: Duration,
}

impl Default for PurgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            x_mm: 0.0,
            y_mm: 500.0,
            duration: Duration::from_secs(2),
        }
    }
}

/// Counts from one program replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Coordinated moves executed
    pub moves: usize,
    /// Tool-on commands executed
    pub tool_on: usize,
    /// Tool-off commands executed
    pub tool_off: usize,
    /// Lines that were not executed
    pub skipped: usize,
}

/// X/Y gantry plus tool
pub struct Gantry {
    x_axis: Axis,
    y_axis: Axis,
    tool: ToolActuator,
    motion: MotionSettings,
    purge: PurgeSettings,
    clock: SharedClock,
    cancel: CancelToken,
    position: Option<(f64, f64)>,
}

impl Gantry {
    /// Compose a gantry from connected parts
    pub fn new(
        x_axis: Axis,
        y_axis: Axis,
        tool: ToolActuator,
        motion: MotionSettings,
        purge: PurgeSettings,
        clock: SharedClock,
        cancel: CancelToken,
    ) -> Self {
        Self {
            x_axis,
            y_axis,
            tool,
            motion,
            purge,
            clock,
            cancel,
            position: None,
        }
    }

    /// Dead-reckoning delay for a move from the last commanded position
    ///
    /// Zero when no position has been commanded yet. Fails when either
    /// axis' velocity limit leaves no headroom above the margin.
    pub fn estimate_delay(&self, x_mm: f64, y_mm: f64) -> Result<Duration> {
        let margin = self.motion.velocity_margin;
        for axis in [&self.x_axis, &self.y_axis] {
            let velocity_limit = f64::from(axis.velocity_limit());
            if velocity_limit <= margin {
                return Err(MotionError::VelocityAtOrBelowMargin {
                    velocity_limit,
                    margin,
                }
                .into());
            }
        }

        let Some((last_x, last_y)) = self.position else {
            return Ok(Duration::ZERO);
        };

        let x_est = self.axis_estimate(&self.x_axis, x_mm - last_x);
        let y_est = self.axis_estimate(&self.y_axis, y_mm - last_y);
        tracing::debug!("x-est: {:.3}s y-est: {:.3}s", x_est, y_est);

        let seconds = x_est.abs().max(y_est.abs());
        Duration::try_from_secs_f64(seconds)
            .map_err(|_| MotionError::DelayOutOfRange { seconds }.into())
    }

    fn axis_estimate(&self, axis: &Axis, distance_mm: f64) -> f64 {
        let radians_to_go = axis.mm_to_rad(distance_mm);
        let headroom = f64::from(axis.velocity_limit()) - self.motion.velocity_margin;
        self.motion.delay_scale * radians_to_go / headroom
    }

    /// Move to (x, y) and wait for the estimated travel time
    ///
    /// Returns the delay that was slept.
    pub fn set_xy(&mut self, x_mm: f64, y_mm: f64) -> Result<Duration> {
        let delay = self.estimate_delay(x_mm, y_mm)?;
        // Neither axis moves unless both targets are sendable
        self.x_axis.target_angle(self.x_axis.mm_to_rad(x_mm))?;
        self.y_axis.target_angle(self.y_axis.mm_to_rad(y_mm))?;

        self.position = Some((x_mm, y_mm));
        self.x_axis.set_target_pos_mm(x_mm)?;
        self.y_axis.set_target_pos_mm(y_mm)?;

        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} for ({}, {})", delay, x_mm, y_mm);
            self.clock.sleep(delay);
        }
        Ok(delay)
    }

    /// Prime the tool at the purge position
    pub fn purge(&mut self) -> Result<()> {
        if !self.purge.enabled {
            return Ok(());
        }
        tracing::info!("Purging at ({}, {})", self.purge.x_mm, self.purge.y_mm);
        self.set_xy(self.purge.x_mm, self.purge.y_mm)?;
        self.tool.on()?;
        self.clock.sleep(self.purge.duration);
        self.tool.off()
    }

    /// Purge, then replay a program line by line
    ///
    /// Only moves, `M3` and `M5` are executed; everything else is counted
    /// as skipped. The cancel token is checked before every line.
    pub fn run_program<R: BufRead>(&mut self, reader: R) -> Result<ReplaySummary> {
        self.purge()?;

        let mut summary = ReplaySummary::default();
        for (index, line) in reader.lines().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(MotionError::Cancelled.into());
            }
            let line = line?;
            let line_number = index as u32 + 1;

            match parse_line(&line, line_number) {
                LineParse::Command(ReplayCommand::Move { x, y }) => {
                    self.set_xy(x, y)?;
                    summary.moves += 1;
                }
                LineParse::Command(ReplayCommand::ToolOn) => {
                    self.tool.on()?;
                    summary.tool_on += 1;
                }
                LineParse::Command(ReplayCommand::ToolOff) => {
                    self.tool.off()?;
                    summary.tool_off += 1;
                }
                LineParse::Empty => {}
                LineParse::Skipped(reason) => {
                    tracing::debug!("Line {}: {}", line_number, reason);
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            "Replay finished: {} moves, {} skipped lines",
            summary.moves,
            summary.skipped
        );
        Ok(summary)
    }

    /// Replay a program file
    pub fn run_gcode(&mut self, path: &Path) -> Result<ReplaySummary> {
        let file = File::open(path).map_err(|e| GcodeError::File {
            reason: format!("{}: {}", path.display(), e),
        })?;
        self.run_program(BufReader::new(file))
    }

    /// Home Y then X, then switch both axes to their run profile
    pub fn home_all(&mut self) -> Result<()> {
        self.y_axis.find_home()?;
        self.x_axis.find_home()?;
        self.clock.sleep(self.motion.post_home_settle);
        self.y_axis.apply_run_profile()?;
        self.x_axis.apply_run_profile()?;
        self.position = None;
        Ok(())
    }

    /// Bench cycle: X out with the tool off, back with it on
    pub fn cycle(&mut self, count: usize, distance_mm: f64, dwell: Duration) -> Result<()> {
        for i in 0..count {
            if self.cancel.is_cancelled() {
                return Err(MotionError::Cancelled.into());
            }
            tracing::debug!("Cycle {}/{}", i + 1, count);

            self.tool.off()?;
            self.x_axis.set_target_pos_mm(distance_mm)?;
            self.clock.sleep(dwell);
            self.tool.on()?;
            self.x_axis.set_target_pos_mm(0.0)?;
            self.clock.sleep(dwell);
        }
        self.tool.off()
    }

    /// Turn the tool off and close every port
    pub fn shutdown(&mut self) {
        self.tool.shutdown();
        self.x_axis.close();
        self.y_axis.close();
        tracing::info!("Gantry shut down");
    }

    /// Last commanded position
    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    /// X axis
    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    /// Mutable X axis
    pub fn x_axis_mut(&mut self) -> &mut Axis {
        &mut self.x_axis
    }

    /// Y axis
    pub fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    /// Mutable Y axis
    pub fn y_axis_mut(&mut self) -> &mut Axis {
        &mut self.y_axis
    }

    /// Tool actuator
    pub fn tool_mut(&mut self) -> &mut ToolActuator {
        &mut self.tool
    }
}
