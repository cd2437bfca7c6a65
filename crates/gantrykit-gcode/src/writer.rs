//! G-code generation from ordered toolpaths.

use gantrykit_core::{round_to, GcodeError, Result};
use std::fmt;
use std::path::Path;

/// Default feed rate for linear moves (mm/min)
pub const DEFAULT_FEED: u32 = 800;

/// One contour as an ordered list of (x, y) points in millimetres
pub type Toolpath = Vec<(f64, f64)>;

/// Spindle words emitted into programs
///
/// Distinct from the serial actuator's `ON` / `OFF` commands; the replay
/// loop translates between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpindleCommand {
    /// `M3 S1`
    On,
    /// `M5`
    Off,
}

impl SpindleCommand {
    /// G-code text of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "M3 S1",
            Self::Off => "M5",
        }
    }
}

/// Accumulates a g-code program in memory
#[derive(Debug, Clone)]
pub struct GcodeWriter {
    lines: Vec<String>,
    location: (f64, f64),
}

impl GcodeWriter {
    /// Start a program: millimetres, absolute positioning, move to start
    pub fn new() -> Self {
        let mut writer = Self {
            lines: Vec::new(),
            location: (0.0, 0.0),
        };
        writer.push_line("G21");
        writer.push_line("G90");
        writer.push_line("G0 X0 Y0 Z10");
        writer
    }

    /// Append a raw line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Emit a linear move to (x, y), rounded to three decimals
    pub fn set_location(&mut self, x: f64, y: f64, feed: u32) {
        let x = round_to(x, 3);
        let y = round_to(y, 3);
        self.location = (x, y);
        self.push_line(format!("G1 X{} Y{} F{}", x, y, feed));
    }

    /// Emit a spindle word
    pub fn tool(&mut self, command: SpindleCommand) {
        self.push_line(command.as_str());
    }

    /// Emit every contour: travel with the tool off, then trace with it on
    pub fn add_toolpaths(&mut self, toolpaths: &[Toolpath], feed: u32) {
        for toolpath in toolpaths {
            let Some(&(start_x, start_y)) = toolpath.first() else {
                continue;
            };
            self.tool(SpindleCommand::Off);
            self.set_location(start_x, start_y, feed);
            self.tool(SpindleCommand::On);
            for &(x, y) in toolpath {
                self.set_location(x, y, feed);
            }
        }
    }

    /// Last commanded location
    pub fn location(&self) -> (f64, f64) {
        self.location
    }

    /// Program lines emitted so far
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Write the program to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string()).map_err(|e| GcodeError::File {
            reason: format!("{}: {}", path.display(), e),
        })?;
        tracing::info!("Wrote {} g-code lines to {}", self.lines.len(), path.display());
        Ok(())
    }
}

impl Default for GcodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GcodeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}
