use gantrykit_communication::mock::MockPortDirectory;
use gantrykit_communication::{DeviceIdentity, FailurePolicy, ToolActuator, ToolSettings};
use gantrykit_core::ManualClock;
use std::time::Duration;

const TOOL_SN: &str = "3423931353535120B1E0";

#[test]
fn test_connect_waits_for_board_boot() {
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyUSB0", TOOL_SN);
    let clock = ManualClock::new();

    let tool = ToolActuator::connect(
        &directory,
        &ToolSettings::new(DeviceIdentity::new(TOOL_SN)),
        &clock,
    );

    assert!(tool.is_connected());
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
}

#[test]
fn test_on_off_send_actuator_dialect() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyUSB0", TOOL_SN);
    let clock = ManualClock::new();
    let mut tool = ToolActuator::connect(
        &directory,
        &ToolSettings::new(DeviceIdentity::new(TOOL_SN)),
        &clock,
    );

    tool.on().unwrap();
    tool.off().unwrap();

    assert_eq!(device.written(), vec!["ON\n".to_string(), "OFF\n".to_string()]);
}

#[test]
fn test_absent_tool_strict_and_lenient() {
    let directory = MockPortDirectory::new();
    let clock = ManualClock::new();

    let mut settings = ToolSettings::new(DeviceIdentity::new(TOOL_SN));
    let mut strict = ToolActuator::connect(&directory, &settings, &clock);
    assert!(!strict.is_connected());
    assert!(strict.on().unwrap_err().is_connection_error());

    settings.policy = FailurePolicy::Lenient;
    let mut lenient = ToolActuator::connect(&directory, &settings, &clock);
    assert!(lenient.on().is_ok());
}

#[test]
fn test_shutdown_turns_tool_off_and_closes() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyUSB0", TOOL_SN);
    let clock = ManualClock::new();
    let mut tool = ToolActuator::connect(
        &directory,
        &ToolSettings::new(DeviceIdentity::new(TOOL_SN)),
        &clock,
    );

    tool.on().unwrap();
    tool.shutdown();

    assert_eq!(device.commands(), vec!["ON".to_string(), "OFF".to_string()]);
    assert!(!device.is_open());
    assert!(!tool.is_connected());
}
