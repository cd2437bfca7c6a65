use gantrykit_gcode::{parse_line, GcodeWriter, LineParse, ReplayCommand, DEFAULT_FEED};
use tempfile::TempDir;

#[test]
fn test_saved_program_replays_as_moves_and_tool_words() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("board.gcode");

    let mut writer = GcodeWriter::new();
    writer.add_toolpaths(&[vec![(10.0, 20.0), (30.0, 20.0)]], DEFAULT_FEED);
    writer.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let commands: Vec<ReplayCommand> = text
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match parse_line(line, i as u32 + 1) {
            LineParse::Command(command) => Some(command),
            _ => None,
        })
        .collect();

    assert_eq!(
        commands,
        vec![
            ReplayCommand::Move { x: 0.0, y: 0.0 },
            ReplayCommand::ToolOff,
            ReplayCommand::Move { x: 10.0, y: 20.0 },
            ReplayCommand::ToolOn,
            ReplayCommand::Move { x: 10.0, y: 20.0 },
            ReplayCommand::Move { x: 30.0, y: 20.0 },
        ]
    );
}

#[test]
fn test_save_to_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("out.gcode");

    let err = GcodeWriter::new().save(&path).unwrap_err();
    assert!(err.to_string().contains("out.gcode"));
}
