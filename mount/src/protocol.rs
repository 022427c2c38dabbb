//! Wire format for the motion controller.
//!
//! Commands are ASCII frames, one `;`-terminated record each:
//! `"<code>,<axis>,<value>;"` for per-axis commands and `"<code>,<value>;"`
//! for controller-wide ones. There is no checksum and no acknowledgment; the
//! controller acts on what it can parse and stays silent otherwise.

use std::fmt;

use thiserror::Error;

/// Mount axes, by controller motor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Motor 0, the bearing axis.
    Azimuth,
    /// Motor 1, the elevation axis.
    Altitude,
}

impl Axis {
    /// Controller motor index for this axis.
    pub fn motor(self) -> u8 {
        match self {
            Axis::Azimuth => 0,
            Axis::Altitude => 1,
        }
    }

    fn from_motor(motor: u8) -> Option<Self> {
        match motor {
            0 => Some(Axis::Azimuth),
            1 => Some(Axis::Altitude),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Azimuth => write!(f, "azimuth"),
            Axis::Altitude => write!(f, "altitude"),
        }
    }
}

/// Command codes the controller firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Overwrite one axis's absolute position counter without motion.
    SeedPosition,
    /// Select joystick jog speed (0 slow, 1 fast).
    JogSpeed,
    /// Mirror the joystick's altitude sense (0 off, 1 on).
    Mirror,
    /// Request one averaged inertial-sensor sample.
    SampleImu,
    /// Move one axis to an absolute tick position.
    MoveAbsolute,
    /// Enable joystick input.
    JoystickEnable,
    /// Disable joystick input.
    JoystickDisable,
}

impl CommandCode {
    /// Numeric code on the wire.
    pub fn code(self) -> u8 {
        match self {
            CommandCode::SeedPosition => 12,
            CommandCode::JogSpeed => 20,
            CommandCode::Mirror => 21,
            CommandCode::SampleImu => 27,
            CommandCode::MoveAbsolute => 32,
            CommandCode::JoystickEnable => 40,
            CommandCode::JoystickDisable => 41,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            12 => Some(CommandCode::SeedPosition),
            20 => Some(CommandCode::JogSpeed),
            21 => Some(CommandCode::Mirror),
            27 => Some(CommandCode::SampleImu),
            32 => Some(CommandCode::MoveAbsolute),
            40 => Some(CommandCode::JoystickEnable),
            41 => Some(CommandCode::JoystickDisable),
            _ => None,
        }
    }
}

/// One controller command. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    pub code: CommandCode,
    /// `None` for controller-wide commands.
    pub axis: Option<Axis>,
    pub value: i32,
}

impl MotionCommand {
    pub fn per_axis(code: CommandCode, axis: Axis, value: i32) -> Self {
        Self {
            code,
            axis: Some(axis),
            value,
        }
    }

    pub fn global(code: CommandCode, value: i32) -> Self {
        Self {
            code,
            axis: None,
            value,
        }
    }

    /// Render the `;`-terminated ASCII frame.
    pub fn encode(&self) -> String {
        match self.axis {
            Some(axis) => format!("{},{},{};", self.code.code(), axis.motor(), self.value),
            None => format!("{},{};", self.code.code(), self.value),
        }
    }

    /// Parse a single `;`-terminated frame back into a command.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let body = frame
            .strip_suffix(';')
            .ok_or(DecodeError::MissingTerminator)?;
        let fields: Vec<&str> = body.split(',').collect();

        let code_num = parse_int::<u8>(fields[0])?;
        let code = CommandCode::from_code(code_num)
            .ok_or(DecodeError::UnknownCode { code: code_num })?;

        match fields.len() {
            2 => Ok(MotionCommand::global(code, parse_int(fields[1])?)),
            3 => {
                let motor = parse_int::<u8>(fields[1])?;
                let axis =
                    Axis::from_motor(motor).ok_or(DecodeError::UnknownMotor { motor })?;
                Ok(MotionCommand::per_axis(code, axis, parse_int(fields[2])?))
            }
            got => Err(DecodeError::WrongFieldCount { got }),
        }
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_int<T: std::str::FromStr>(field: &str) -> Result<T, DecodeError> {
    field.trim().parse().map_err(|_| DecodeError::BadInteger {
        field: field.to_string(),
    })
}

/// Reasons a frame fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame does not end with ';'")]
    MissingTerminator,
    #[error("expected 2 or 3 comma-separated fields, got {got}")]
    WrongFieldCount { got: usize },
    #[error("unrecognized command code {code}")]
    UnknownCode { code: u8 },
    #[error("motor index {motor} is not an axis")]
    UnknownMotor { motor: u8 },
    #[error("field {field:?} is not an integer")]
    BadInteger { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_axis_frames_carry_the_motor_index() {
        let cmd = MotionCommand::per_axis(CommandCode::MoveAbsolute, Axis::Altitude, 256_000);
        assert_eq!(cmd.encode(), "32,1,256000;");

        let cmd = MotionCommand::per_axis(CommandCode::MoveAbsolute, Axis::Azimuth, -512_000);
        assert_eq!(cmd.encode(), "32,0,-512000;");
    }

    #[test]
    fn global_frames_have_two_fields() {
        assert_eq!(
            MotionCommand::global(CommandCode::JogSpeed, 0).encode(),
            "20,0;"
        );
        assert_eq!(
            MotionCommand::global(CommandCode::SampleImu, 0).encode(),
            "27,0;"
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let commands = [
            MotionCommand::per_axis(CommandCode::MoveAbsolute, Axis::Altitude, 2_304_000),
            MotionCommand::per_axis(CommandCode::SeedPosition, Axis::Azimuth, -1),
            MotionCommand::global(CommandCode::Mirror, 1),
            MotionCommand::global(CommandCode::JoystickDisable, 1),
        ];
        for cmd in commands {
            assert_eq!(MotionCommand::decode(&cmd.encode()).unwrap(), cmd);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(
            MotionCommand::decode("32,1,100"),
            Err(DecodeError::MissingTerminator)
        );
        assert_eq!(
            MotionCommand::decode("99,1;"),
            Err(DecodeError::UnknownCode { code: 99 })
        );
        assert_eq!(
            MotionCommand::decode("32,7,100;"),
            Err(DecodeError::UnknownMotor { motor: 7 })
        );
        assert_eq!(
            MotionCommand::decode("32,1,2,3;"),
            Err(DecodeError::WrongFieldCount { got: 4 })
        );
        assert_eq!(
            MotionCommand::decode("32,one;"),
            Err(DecodeError::BadInteger {
                field: "one".into()
            })
        );
    }
}
