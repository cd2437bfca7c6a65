//! # GantryKit G-Code
//!
//! The g-code side of the machine: a writer that turns ordered toolpaths
//! into a program (spindle dialect `M3 S1` / `M5`), and the line parser used
//! when a program is replayed on the gantry.

pub mod program;
pub mod writer;

pub use program::{parse_line, LineParse, ReplayCommand};
pub use writer::{GcodeWriter, SpindleCommand, Toolpath, DEFAULT_FEED};
