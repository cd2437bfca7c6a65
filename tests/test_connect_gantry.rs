use gantrykit::{connect_gantry, with_gantry, CancelToken, Error, MachineConfig};
use gantrykit_communication::mock::MockPortDirectory;
use gantrykit_core::ManualClock;
use std::sync::Arc;
use std::time::Duration;

fn bench(config: &MachineConfig) -> MockPortDirectory {
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyUSB0", &config.tool.identity);
    for (port, axis) in [("/dev/ttyACM0", &config.x_axis), ("/dev/ttyACM1", &config.y_axis)] {
        let device = directory.add_usb_device(port, &axis.identity);
        device.push_line(">9:0");
    }
    directory
}

#[test]
fn test_connect_gantry_from_default_config() {
    let mut config = MachineConfig::new();
    config.x_axis.backlog_threshold_bytes = 4096;
    config.y_axis.backlog_threshold_bytes = 4096;
    let directory = bench(&config);
    let clock = Arc::new(ManualClock::new());

    let mut gantry =
        connect_gantry(&directory, &config, clock.clone(), CancelToken::new()).unwrap();

    assert!(gantry.x_axis().is_connected());
    assert!(gantry.y_axis().is_connected());
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);

    let commands: Vec<String> = directory
        .journal()
        .into_iter()
        .map(|entry| format!("{} {}", entry.port_name, entry.command))
        .collect();
    assert_eq!(commands.len(), 12);
    assert_eq!(commands[0], "/dev/ttyACM0 MLV20");
    assert_eq!(commands[6], "/dev/ttyACM1 MLV20");

    gantry.shutdown();
    assert_eq!(
        directory.journal().last().map(|entry| entry.command.clone()),
        Some("OFF".to_string())
    );
}

#[test]
fn test_missing_axis_fails_under_strict_policy() {
    let config = MachineConfig::new();
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyUSB0", &config.tool.identity);

    let result = connect_gantry(
        &directory,
        &config,
        Arc::new(ManualClock::new()),
        CancelToken::new(),
    );

    assert!(result.err().unwrap().is_connection_error());
}

#[test]
fn test_cancelled_run_still_turns_tool_off() {
    let mut config = MachineConfig::new();
    config.x_axis.backlog_threshold_bytes = 4096;
    config.y_axis.backlog_threshold_bytes = 4096;
    let directory = bench(&config);
    let cancel = CancelToken::new();
    let interrupt = cancel.clone();

    let result: gantrykit::Result<()> = with_gantry(
        &directory,
        &config,
        Arc::new(ManualClock::new()),
        cancel,
        |gantry| {
            gantry.tool_mut().on()?;
            interrupt.cancel();
            gantry.cycle(3, 50.0, Duration::from_secs(1))
        },
    );

    assert!(matches!(result, Err(ref err) if err.is_cancelled()));
    let commands: Vec<String> = directory
        .journal()
        .into_iter()
        .map(|entry| entry.command)
        .collect();
    let on = commands.iter().rposition(|c| c == "ON").unwrap();
    assert_eq!(commands[on + 1..], ["OFF".to_string()]);
}

#[test]
fn test_with_gantry_reports_connection_failure() {
    let config = MachineConfig::new();
    let directory = MockPortDirectory::new();

    let result: Result<(), Error> = with_gantry(
        &directory,
        &config,
        Arc::new(ManualClock::new()),
        CancelToken::new(),
        |_| Ok(()),
    );

    assert!(result.unwrap_err().is_connection_error());
}
