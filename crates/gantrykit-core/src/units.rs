//! Unit conversion utilities
//!
//! Linear axes are driven by rotary motors through a pulley of fixed
//! radius, so positions travel between millimetres and radians. Motor
//! commands are quantised to [`COMMAND_DECIMALS`] places, telemetry to
//! [`TELEMETRY_DECIMALS`].

/// Decimal places carried by outbound angle commands.
pub const COMMAND_DECIMALS: u32 = 2;

/// Decimal places kept from inbound telemetry values.
pub const TELEMETRY_DECIMALS: u32 = 3;

/// Round `value` to `places` decimal places (half away from zero).
pub fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    let rounded = (value * scale).round() / scale;
    // Normalise -0.0 so it formats as "0" on the wire
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Convert a linear distance to a motor angle at command granularity.
///
/// Sub-hundredth-radian precision is discarded.
pub fn mm_to_rad(mm: f64, radius_mm: f64) -> f64 {
    round_to(mm / radius_mm, COMMAND_DECIMALS)
}

/// Convert a motor angle back to a linear distance at telemetry granularity.
pub fn rad_to_mm(rad: f64, radius_mm: f64) -> f64 {
    round_to(rad * radius_mm, TELEMETRY_DECIMALS)
}
