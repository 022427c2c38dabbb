//! Framed command I/O with the motion controller.
//!
//! One tier above [`Transport`]: this module knows the command set and the
//! send discipline, nothing about pointing. Every frame goes out with the
//! input buffer flushed on both sides of the write, because the controller
//! streams joystick chatter whenever its stick is live and none of that may
//! be mistaken for a response. Motion commands get no acknowledgment at all;
//! only the sample request produces bytes back.

use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;
use crate::imu::{self, ImuSample};
use crate::protocol::{Axis, CommandCode, MotionCommand};
use crate::transport::Transport;

/// Settle time between a sample request and reading its response.
const IMU_RESPONSE_WAIT: Duration = Duration::from_millis(100);

/// Joystick jog speeds the controller supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogSpeed {
    Slow,
    Fast,
}

impl JogSpeed {
    fn wire(self) -> i32 {
        match self {
            JogSpeed::Slow => 0,
            JogSpeed::Fast => 1,
        }
    }
}

/// Command-level interface to the motion controller.
pub struct MountDevice<T: Transport> {
    transport: T,
}

impl<T: Transport> MountDevice<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Move one axis to an absolute tick position. Fire and forget.
    pub fn move_axis(&mut self, axis: Axis, ticks: i32) -> Result<()> {
        self.send(MotionCommand::per_axis(CommandCode::MoveAbsolute, axis, ticks))
    }

    /// Overwrite one axis's position counter without motion.
    pub fn seed_axis(&mut self, axis: Axis, ticks: i32) -> Result<()> {
        self.send(MotionCommand::per_axis(CommandCode::SeedPosition, axis, ticks))
    }

    pub fn set_jog_speed(&mut self, speed: JogSpeed) -> Result<()> {
        self.send(MotionCommand::global(CommandCode::JogSpeed, speed.wire()))
    }

    pub fn set_mirror(&mut self, on: bool) -> Result<()> {
        self.send(MotionCommand::global(CommandCode::Mirror, i32::from(on)))
    }

    pub fn set_joystick(&mut self, enabled: bool) -> Result<()> {
        let code = if enabled {
            CommandCode::JoystickEnable
        } else {
            CommandCode::JoystickDisable
        };
        self.send(MotionCommand::global(code, 1))
    }

    /// Request one averaged inertial sample and decode the response.
    pub fn read_imu_sample(&mut self) -> Result<ImuSample> {
        self.send(MotionCommand::global(CommandCode::SampleImu, 0))?;
        thread::sleep(IMU_RESPONSE_WAIT);
        let raw = self.transport.read_available()?;
        let record = String::from_utf8_lossy(&raw);
        trace!("<- {record}");
        let sample = imu::parse_sample(&record)?;
        debug!(
            "sample: alt {:.3}°, az {:.3}°, {} comm errors",
            sample.altitude_deg, sample.azimuth_deg, sample.comm_errors
        );
        Ok(sample)
    }

    /// Write one frame, flushing stale input on both sides of the write.
    fn send(&mut self, command: MotionCommand) -> Result<()> {
        let frame = command.encode();
        debug!("-> {frame}");
        self.transport.flush_input()?;
        self.transport.write_bytes(frame.as_bytes())?;
        self.transport.flush_input()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Activity, MockTransport};

    #[test]
    fn every_frame_is_bracketed_by_input_flushes() {
        let mock = MockTransport::new();
        let mut device = MountDevice::new(mock.clone());

        device.move_axis(Axis::Altitude, 256_000).unwrap();

        assert_eq!(
            mock.activity(),
            vec![
                Activity::FlushInput,
                Activity::Write("32,1,256000;".into()),
                Activity::FlushInput,
            ]
        );
    }

    #[test]
    fn mode_commands_use_the_two_field_form() {
        let mock = MockTransport::new();
        let mut device = MountDevice::new(mock.clone());

        device.set_jog_speed(JogSpeed::Fast).unwrap();
        device.set_mirror(false).unwrap();
        device.set_joystick(true).unwrap();
        device.set_joystick(false).unwrap();

        assert_eq!(mock.frames(), vec!["20,1;", "21,0;", "40,1;", "41,1;"]);
    }

    #[test]
    fn sample_request_reads_after_the_settle() {
        let mock = MockTransport::new();
        let mut device = MountDevice::new(mock.clone());

        let record = format!(
            "IM,40,az{:08X},al{:08X},yw{:08X},ax{:08X},ay{:08X},gz{:08X},ec3",
            263.5f32.to_bits(),
            45.25f32.to_bits(),
            0.5f32.to_bits(),
            0.0f32.to_bits(),
            0.0f32.to_bits(),
            9.75f32.to_bits(),
        );
        mock.push_response(record.as_bytes());

        let sample = device.read_imu_sample().unwrap();
        assert_eq!(mock.frames(), vec!["27,0;"]);
        assert_eq!(sample.azimuth_deg, 263.5);
        assert_eq!(sample.altitude_deg, 45.25);
        assert_eq!(sample.comm_errors, 3);
    }

    #[test]
    fn empty_response_is_a_sensor_error_not_a_panic() {
        let mock = MockTransport::new();
        let mut device = MountDevice::new(mock.clone());

        let err = device.read_imu_sample().unwrap_err();
        assert!(matches!(err, crate::MountError::SensorFrame(_)));
    }
}
