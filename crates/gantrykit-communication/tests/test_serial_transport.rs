use gantrykit_communication::mock::MockPortDirectory;
use gantrykit_communication::{
    list_ports, DeviceIdentity, LinkSettings, SendOutcome, SerialPortInfo, SerialTransport,
};
use std::time::Duration;

fn settings() -> LinkSettings {
    LinkSettings::new(115200, Duration::from_millis(100))
}

#[test]
fn test_connect_binds_first_matching_port() {
    let directory = MockPortDirectory::new();
    let _other = directory.add_usb_device("/dev/ttyACM0", "205D305F484E");
    let first = directory.add_usb_device("/dev/ttyACM1", "209D3077484E");
    let second = directory.add_usb_device("/dev/ttyACM2", "209D3077484E-B");

    let transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    assert!(transport.is_connected());
    assert_eq!(transport.port_name(), Some("/dev/ttyACM1"));
    assert_eq!(first.open_count(), 1);
    assert_eq!(second.open_count(), 0);
}

#[test]
fn test_connect_skips_match_that_fails_to_open() {
    let directory = MockPortDirectory::new();
    let broken = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    broken.fail_open(true);
    let _working = directory.add_usb_device("/dev/ttyACM1", "209D3077484E");

    let transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    assert_eq!(transport.port_name(), Some("/dev/ttyACM1"));
}

#[test]
fn test_missing_device_degrades_to_skipped_sends() {
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyACM0", "205D305F484E");

    let mut transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    assert!(!transport.is_connected());
    assert_eq!(transport.send(b"MC2\n"), SendOutcome::Skipped);
    assert!(transport.read_line().unwrap_err().is_connection_error());
    assert!(directory.journal().is_empty());
}

#[test]
fn test_enumeration_failure_leaves_transport_absent() {
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    directory.fail_enumeration(true);

    let transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());
    assert!(!transport.is_connected());
}

#[test]
fn test_single_write_failure_reconnects_once_without_retry() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    let mut transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    device.fail_next_writes(1);
    let outcome = transport.send(b"M1.5\n");
    assert!(matches!(outcome, SendOutcome::Failed { .. }));
    assert_eq!(device.reopen_count(), 1);
    assert_eq!(transport.reconnect_count(), 1);
    assert!(device.written().is_empty());

    assert!(transport.send(b"M2\n").is_sent());
    assert_eq!(device.commands(), vec!["M2".to_string()]);
    assert_eq!(device.reopen_count(), 1);
}

#[test]
fn test_read_failure_reconnects_and_reports() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    let mut transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    device.push_line(">9:1.0");
    device.fail_next_reads(1);

    assert!(transport.read_line().is_err());
    assert_eq!(device.reopen_count(), 1);
    assert_eq!(transport.read_line().unwrap(), Some(">9:1.0".to_string()));
    assert_eq!(transport.read_line().unwrap(), None);
}

#[test]
fn test_reconnect_failure_is_reported() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    let mut transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    device.fail_open(true);
    assert!(transport.reconnect().is_err());
    assert!(!device.is_open());
    assert!(matches!(transport.send(b"M0\n"), SendOutcome::Failed { .. }));
}

#[test]
fn test_close_stops_sends() {
    let directory = MockPortDirectory::new();
    let device = directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    let mut transport =
        SerialTransport::connect(&directory, DeviceIdentity::new("209D3077484E"), settings());

    transport.close();
    assert!(!device.is_open());
    assert_eq!(device.close_count(), 1);
    assert_eq!(transport.send(b"M0\n"), SendOutcome::Skipped);

    drop(transport);
    assert_eq!(device.close_count(), 1);
}

#[test]
fn test_list_ports_reports_hardware_ids() {
    let directory = MockPortDirectory::new();
    directory.add_usb_device("/dev/ttyACM0", "209D3077484E");
    directory.add_device(SerialPortInfo::new("/dev/ttyS0", "PCI Serial"));

    let ports = list_ports(&directory).unwrap();
    assert_eq!(ports.len(), 2);
    assert_eq!(ports[0].1, "USB VID:PID=0483:5740 SER=209D3077484E");
    assert_eq!(ports[1].1, "PCI Serial");
}
