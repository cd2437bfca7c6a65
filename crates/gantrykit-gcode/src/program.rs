//! Replay program parsing
//!
//! The gantry replays a deliberately tiny subset of g-code:
//!
//! | Word | Meaning |
//! |------|---------|
//! | `G0` / `G1 X# Y# [F#]` | Coordinated move (feed ignored) |
//! | `M3 [S#]` | Tool on |
//! | `M5` | Tool off |
//!
//! Everything else is skipped.

use gantrykit_core::GcodeError;

/// One interpreted program line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplayCommand {
    /// Coordinated move to absolute (x, y) in millimetres
    Move {
        /// Target X
        x: f64,
        /// Target Y
        y: f64,
    },
    /// Tool on
    ToolOn,
    /// Tool off
    ToolOff,
}

/// Result of parsing one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineParse {
    /// A command to execute
    Command(ReplayCommand),
    /// Blank or comment-only line
    Empty,
    /// A line that is not executed, with the reason
    Skipped(String),
}

/// Parse one program line; `line_number` is used in diagnostics only
pub fn parse_line(line: &str, line_number: u32) -> LineParse {
    let code = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    };

    let mut words = code.split_whitespace();
    let Some(first) = words.next() else {
        return LineParse::Empty;
    };

    match first.to_ascii_uppercase().as_str() {
        "G0" | "G00" | "G1" | "G01" => match parse_move(words, line_number) {
            Ok(command) => LineParse::Command(command),
            Err(e) => LineParse::Skipped(e.to_string()),
        },
        "M3" | "M03" => LineParse::Command(ReplayCommand::ToolOn),
        "M5" | "M05" => LineParse::Command(ReplayCommand::ToolOff),
        other => LineParse::Skipped(format!("unsupported word {}", other)),
    }
}

fn parse_move<'a>(
    words: impl Iterator<Item = &'a str>,
    line_number: u32,
) -> Result<ReplayCommand, GcodeError> {
    let mut x = None;
    let mut y = None;

    for word in words {
        let mut chars = word.chars();
        let Some(letter) = chars.next() else {
            continue;
        };
        let target = match letter.to_ascii_uppercase() {
            'X' => &mut x,
            'Y' => &mut y,
            _ => continue,
        };
        let value = chars
            .as_str()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| GcodeError::InvalidWord {
                line_number,
                word: word.to_string(),
            })?;
        *target = Some(value);
    }

    match (x, y) {
        (Some(x), Some(y)) => Ok(ReplayCommand::Move { x, y }),
        _ => Err(GcodeError::InvalidWord {
            line_number,
            word: "move without both X and Y".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moves() {
        assert_eq!(
            parse_line("G1 X50 Y-2.5 F800", 1),
            LineParse::Command(ReplayCommand::Move { x: 50.0, y: -2.5 })
        );
        assert_eq!(
            parse_line("g0 y3 x4", 1),
            LineParse::Command(ReplayCommand::Move { x: 4.0, y: 3.0 })
        );
    }

    #[test]
    fn test_parse_tool_words() {
        assert_eq!(parse_line("M3 S1", 1), LineParse::Command(ReplayCommand::ToolOn));
        assert_eq!(parse_line("M3", 1), LineParse::Command(ReplayCommand::ToolOn));
        assert_eq!(parse_line("M5 ; stop", 1), LineParse::Command(ReplayCommand::ToolOff));
    }

    #[test]
    fn test_empty_and_comment_lines() {
        assert_eq!(parse_line("", 1), LineParse::Empty);
        assert_eq!(parse_line("   \t", 1), LineParse::Empty);
        assert_eq!(parse_line("; header", 1), LineParse::Empty);
    }

    #[test]
    fn test_skipped_lines() {
        assert!(matches!(parse_line("G21", 1), LineParse::Skipped(_)));
        assert!(matches!(parse_line("M30", 1), LineParse::Skipped(_)));
        assert!(matches!(parse_line("G1 X10", 7), LineParse::Skipped(_)));
        assert!(matches!(parse_line("G1 Xabc Y1", 7), LineParse::Skipped(_)));
        assert!(matches!(parse_line("G0 X0 Y0 Z10", 1), LineParse::Command(_)));
    }
}
