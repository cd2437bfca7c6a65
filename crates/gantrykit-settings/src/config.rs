//! Machine configuration
//!
//! One file describes the whole bench: which USB serial numbers belong to
//! the tool board and the two motor controllers, the pulley geometry, the
//! gains and speed limits, homing and purge parameters, and how send
//! failures are reported. JSON and TOML are both accepted; every section
//! may be omitted and falls back to the stock hardware defaults.

use crate::error::{SettingsError, SettingsResult};
use gantrykit_communication::{DeviceIdentity, FailurePolicy, LinkSettings, ToolSettings};
use gantrykit_core::WaitPolicy;
use gantrykit_motion::{AxisSettings, HomingSettings, MotionSettings, PidGains, PurgeSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tool actuator board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Hardware-ID substring (USB serial number)
    pub identity: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Boot delay after opening the port, in milliseconds
    pub settle_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            identity: "3423931353535120B1E0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 1000,
            settle_ms: 2000,
        }
    }
}

/// Angle-loop gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidConfig {
    fn gains(&self) -> PidGains {
        PidGains::new(self.p, self.i, self.d)
    }
}

/// One motor controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    /// Hardware-ID substring (USB serial number)
    pub identity: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Pulley radius in millimetres
    pub radius_mm: f64,
    /// Controller mode sent at start-up
    pub control_mode: u8,
    /// Velocity ceiling sent at start-up
    pub initial_velocity_limit: u32,
    /// Velocity ceiling after homing
    pub run_velocity_limit: u32,
    /// Buffered bytes above which stale telemetry is dropped
    pub backlog_threshold_bytes: usize,
    /// Gains sent at start-up
    pub pid: PidConfig,
    /// Gains after homing
    pub run_pid: PidConfig,
}

impl AxisConfig {
    /// Long (X) axis of the stock bench
    pub fn default_x() -> Self {
        Self {
            identity: "209D3077484E".to_string(),
            run_pid: PidConfig {
                p: 50.0,
                i: 0.0,
                d: 1.3,
            },
            ..Self::default()
        }
    }

    /// Short (Y) axis of the stock bench
    pub fn default_y() -> Self {
        Self {
            identity: "205D305F484E".to_string(),
            ..Self::default()
        }
    }
}

impl Default for AxisConfig {
    /// Stock controller parameters without an identity
    fn default() -> Self {
        let pid = PidConfig {
            p: 50.0,
            i: 0.0,
            d: 1.1,
        };
        Self {
            identity: String::new(),
            baud_rate: 115200,
            read_timeout_ms: 100,
            radius_mm: 6.4,
            control_mode: 2,
            initial_velocity_limit: 20,
            run_velocity_limit: 50,
            backlog_threshold_bytes: 10,
            pid,
            run_pid: pid,
        }
    }
}

/// Homing procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    pub seek_velocity_limit: u32,
    pub seek_target_rad: f64,
    pub settle_ms: u64,
    pub stall_velocity: f64,
    pub backoff_rad: f64,
    pub backoff_settle_ms: u64,
    pub poll_interval_ms: u64,
    /// Give up after this long; absent waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            seek_velocity_limit: 20,
            seek_target_rad: -100.0,
            settle_ms: 1000,
            stall_velocity: 0.02,
            backoff_rad: 0.5,
            backoff_settle_ms: 1000,
            poll_interval_ms: 10,
            timeout_ms: None,
        }
    }
}

/// Controller ready handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Text that marks a controller as ready
    pub sentinel: String,
    pub poll_interval_ms: u64,
    /// Give up after this long; absent waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            sentinel: ">".to_string(),
            poll_interval_ms: 10,
            timeout_ms: None,
        }
    }
}

/// Dead-reckoning coordination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Subtracted from the velocity limit when estimating travel time
    pub velocity_margin: f64,
    /// Multiplier on every travel estimate
    pub delay_scale: f64,
    /// Pause between homing and the run profile
    pub post_home_settle_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            velocity_margin: 10.0,
            delay_scale: 1.0,
            post_home_settle_ms: 1000,
        }
    }
}

/// Purge before replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    pub enabled: bool,
    pub x_mm: f64,
    pub y_mm: f64,
    pub duration_ms: u64,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            x_mm: 0.0,
            y_mm: 500.0,
            duration_ms: 2000,
        }
    }
}

/// Complete machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub failure_policy: FailurePolicy,
    pub tool: ToolConfig,
    pub x_axis: AxisConfig,
    pub y_axis: AxisConfig,
    pub homing: HomingConfig,
    pub handshake: HandshakeConfig,
    pub motion: MotionConfig,
    pub purge: PurgeConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            tool: ToolConfig::default(),
            x_axis: AxisConfig::default_x(),
            y_axis: AxisConfig::default_y(),
            homing: HomingConfig::default(),
            handshake: HandshakeConfig::default(),
            motion: MotionConfig::default(),
            purge: PurgeConfig::default(),
        }
    }
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl MachineConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config dir>/gantrykit/machine.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("gantrykit").join("machine.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory on this platform".into())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded machine configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.tool.identity.is_empty() {
            return Err(SettingsError::invalid("tool.identity", "must not be empty"));
        }
        if self.tool.baud_rate == 0 {
            return Err(SettingsError::invalid("tool.baud_rate", "must be > 0"));
        }
        if self.tool.read_timeout_ms == 0 {
            return Err(SettingsError::invalid("tool.read_timeout_ms", "must be > 0"));
        }

        for (name, axis) in [("x_axis", &self.x_axis), ("y_axis", &self.y_axis)] {
            self.validate_axis(name, axis)?;
        }

        if self.motion.delay_scale <= 0.0 {
            return Err(SettingsError::invalid("motion.delay_scale", "must be > 0"));
        }
        if self.homing.stall_velocity <= 0.0 {
            return Err(SettingsError::invalid("homing.stall_velocity", "must be > 0"));
        }
        if self.handshake.sentinel.is_empty() {
            return Err(SettingsError::invalid("handshake.sentinel", "must not be empty"));
        }

        Ok(())
    }

    fn validate_axis(&self, name: &str, axis: &AxisConfig) -> SettingsResult<()> {
        if axis.identity.is_empty() {
            return Err(SettingsError::invalid(
                &format!("{}.identity", name),
                "must not be empty",
            ));
        }
        if axis.baud_rate == 0 {
            return Err(SettingsError::invalid(
                &format!("{}.baud_rate", name),
                "must be > 0",
            ));
        }
        if axis.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                &format!("{}.read_timeout_ms", name),
                "must be > 0",
            ));
        }
        if axis.radius_mm <= 0.0 {
            return Err(SettingsError::invalid(
                &format!("{}.radius_mm", name),
                "must be > 0",
            ));
        }
        if f64::from(axis.run_velocity_limit) <= self.motion.velocity_margin {
            return Err(SettingsError::invalid(
                &format!("{}.run_velocity_limit", name),
                format!(
                    "must exceed motion.velocity_margin ({})",
                    self.motion.velocity_margin
                ),
            ));
        }
        Ok(())
    }

    /// Tool actuator settings
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            identity: DeviceIdentity::new(&self.tool.identity),
            link: LinkSettings::new(
                self.tool.baud_rate,
                Duration::from_millis(self.tool.read_timeout_ms),
            ),
            settle: Duration::from_millis(self.tool.settle_ms),
            policy: self.failure_policy,
        }
    }

    /// X axis settings
    pub fn x_axis_settings(&self) -> AxisSettings {
        self.axis_settings("X", &self.x_axis)
    }

    /// Y axis settings
    pub fn y_axis_settings(&self) -> AxisSettings {
        self.axis_settings("Y", &self.y_axis)
    }

    fn axis_settings(&self, name: &str, axis: &AxisConfig) -> AxisSettings {
        AxisSettings {
            name: name.to_string(),
            identity: DeviceIdentity::new(&axis.identity),
            link: LinkSettings::new(axis.baud_rate, Duration::from_millis(axis.read_timeout_ms)),
            radius_mm: axis.radius_mm,
            control_mode: axis.control_mode,
            initial_velocity_limit: axis.initial_velocity_limit,
            pid: axis.pid.gains(),
            run_velocity_limit: axis.run_velocity_limit,
            run_pid: axis.run_pid.gains(),
            backlog_threshold_bytes: axis.backlog_threshold_bytes,
            handshake_sentinel: self.handshake.sentinel.clone(),
            handshake: wait_policy(self.handshake.timeout_ms, self.handshake.poll_interval_ms),
            homing: self.homing_settings(),
            policy: self.failure_policy,
        }
    }

    fn homing_settings(&self) -> HomingSettings {
        let homing = &self.homing;
        HomingSettings {
            seek_velocity_limit: homing.seek_velocity_limit,
            seek_target_rad: homing.seek_target_rad,
            settle: Duration::from_millis(homing.settle_ms),
            stall_velocity: homing.stall_velocity,
            backoff_rad: homing.backoff_rad,
            backoff_settle: Duration::from_millis(homing.backoff_settle_ms),
            wait: wait_policy(homing.timeout_ms, homing.poll_interval_ms),
        }
    }

    /// Gantry coordination settings
    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            velocity_margin: self.motion.velocity_margin,
            delay_scale: self.motion.delay_scale,
            post_home_settle: Duration::from_millis(self.motion.post_home_settle_ms),
        }
    }

    /// Purge settings
    pub fn purge_settings(&self) -> PurgeSettings {
        PurgeSettings {
            enabled: self.purge.enabled,
            x_mm: self.purge.x_mm,
            y_mm: self.purge.y_mm,
            duration: Duration::from_millis(self.purge.duration_ms),
        }
    }
}

fn wait_policy(timeout_ms: Option<u64>, poll_interval_ms: u64) -> WaitPolicy {
    let poll_interval = Duration::from_millis(poll_interval_ms);
    match timeout_ms {
        Some(ms) => WaitPolicy::bounded(Duration::from_millis(ms), poll_interval),
        None => WaitPolicy::unbounded(poll_interval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MachineConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.x_axis.identity, "209D3077484E");
        assert_eq!(config.y_axis.identity, "205D305F484E");
        assert_eq!(config.x_axis.run_pid.d, 1.3);
        assert_eq!(config.y_axis.run_pid.d, 1.1);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_run_velocity_must_exceed_margin() {
        let mut config = MachineConfig::new();
        config.y_axis.run_velocity_limit = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("y_axis.run_velocity_limit"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = MachineConfig::new();
        config.x_axis.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = MachineConfig::new();
        config.x_axis.radius_mm = 0.0;
        assert!(config.validate().is_err());

        let mut config = MachineConfig::new();
        config.tool.identity.clear();
        assert!(config.validate().is_err());

        let mut config = MachineConfig::new();
        config.tool.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = MachineConfig::new();
        config.motion.delay_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axis_settings_conversion() {
        let mut config = MachineConfig::new();
        config.homing.timeout_ms = Some(30_000);
        config.failure_policy = FailurePolicy::Lenient;

        let x = config.x_axis_settings();
        assert_eq!(x.name, "X");
        assert_eq!(x.identity.as_str(), "209D3077484E");
        assert_eq!(x.link, LinkSettings::new(115200, Duration::from_millis(100)));
        assert_eq!(x.run_pid, PidGains::new(50.0, 0.0, 1.3));
        assert_eq!(x.homing.wait.timeout, Some(Duration::from_secs(30)));
        assert_eq!(x.handshake.timeout, None);
        assert_eq!(x.policy, FailurePolicy::Lenient);

        let tool = config.tool_settings();
        assert_eq!(tool.settle, Duration::from_secs(2));
        assert_eq!(tool.link.baud_rate, 9600);
    }
}
