//! Motor controller command vocabulary
//!
//! Commands are ASCII, newline-terminated. Floats use the shortest
//! representation that round-trips, so a target of -100 goes out as
//! `M-100` and 15.63 as `M15.63`.

use std::fmt;

/// Outbound motor controller command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    /// `MLV<int>` - velocity ceiling (rad/s)
    VelocityLimit(u32),
    /// `MC<int>` - control mode (2 = angle control)
    ControlMode(u8),
    /// `MAP<float>` - angle loop proportional gain
    PidP(f64),
    /// `MAI<float>` - angle loop integral gain
    PidI(f64),
    /// `MAD<float>` - angle loop derivative gain
    PidD(f64),
    /// `M<float>` - absolute target angle (rad)
    Target(f64),
}

impl MotorCommand {
    /// Encode the command, including the trailing newline
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VelocityLimit(limit) => write!(f, "MLV{}", limit),
            Self::ControlMode(mode) => write!(f, "MC{}", mode),
            Self::PidP(p) => write!(f, "MAP{}", p),
            Self::PidI(i) => write!(f, "MAI{}", i),
            Self::PidD(d) => write!(f, "MAD{}", d),
            Self::Target(angle) => write!(f, "M{}", angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_commands() {
        assert_eq!(MotorCommand::VelocityLimit(20).encode(), "MLV20\n");
        assert_eq!(MotorCommand::ControlMode(2).encode(), "MC2\n");
        assert_eq!(MotorCommand::PidP(50.0).encode(), "MAP50\n");
        assert_eq!(MotorCommand::PidI(0.0).encode(), "MAI0\n");
        assert_eq!(MotorCommand::PidD(1.1).encode(), "MAD1.1\n");
        assert_eq!(MotorCommand::Target(15.63).encode(), "M15.63\n");
        assert_eq!(MotorCommand::Target(-100.0).encode(), "M-100\n");
        assert_eq!(MotorCommand::Target(0.0).encode(), "M0\n");
    }
}
