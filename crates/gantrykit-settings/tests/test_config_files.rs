use gantrykit_communication::FailurePolicy;
use gantrykit_settings::{MachineConfig, SettingsError};
use tempfile::TempDir;

#[test]
fn test_toml_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.toml");

    let mut config = MachineConfig::new();
    config.failure_policy = FailurePolicy::Lenient;
    config.homing.timeout_ms = Some(20_000);
    config.purge.enabled = false;
    config.save_to_file(&path).unwrap();

    let loaded = MachineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip_into_nested_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("gantrykit").join("machine.json");

    let config = MachineConfig::new();
    config.save_to_file(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"failure_policy\": \"strict\""));
    assert_eq!(MachineConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.toml");
    std::fs::write(
        &path,
        r#"
failure_policy = "lenient"

[x_axis]
identity = "AAAA1111"
run_velocity_limit = 40

[handshake]
timeout_ms = 5000
"#,
    )
    .unwrap();

    let config = MachineConfig::load_from_file(&path).unwrap();

    assert_eq!(config.failure_policy, FailurePolicy::Lenient);
    assert_eq!(config.x_axis.identity, "AAAA1111");
    assert_eq!(config.x_axis.run_velocity_limit, 40);
    assert_eq!(config.x_axis.radius_mm, 6.4);
    assert_eq!(config.y_axis.identity, "205D305F484E");
    assert_eq!(config.handshake.timeout_ms, Some(5000));
    assert_eq!(config.handshake.sentinel, ">");
    assert_eq!(config.tool.baud_rate, 9600);
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.toml");
    std::fs::write(&path, "[motion]\nvelocity_margin = 60.0\n").unwrap();

    let err = MachineConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_unsupported_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.yaml");

    let err = MachineConfig::new().save_to_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::UnsupportedFormat(ref ext) if ext == "yaml"));
    assert!(!path.exists());
}

#[test]
fn test_malformed_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.toml");
    std::fs::write(&path, "[tool\nidentity = 1").unwrap();

    let err = MachineConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::TomlError(_)));
}
