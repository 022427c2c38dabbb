//! Pointing and motion control for a two-axis alt/az telescope mount.
//!
//! # Overview
//!
//! The mount is open loop: we command absolute positions in actuator ticks
//! and trust the controller to get there. [`PointingEngine`] owns everything
//! stateful:
//!
//! - the **pointing belief** (degrees, sky frame), updated optimistically as
//!   each axis command is accepted by the transport;
//! - the **calibration offsets** folded into every ephemeris-derived target;
//! - the **last commanded** target, the baseline a later calibration
//!   measures the operator's corrections against.
//!
//! Long-running sessions (raster scans in [`scan`], tracking in [`tracking`])
//! borrow the engine, take a [`CancelToken`], and stop at the next step
//! boundary or dwell tick once it fires.
//!
//! # Axis ordering
//!
//! Moves and counter seeds always touch altitude (motor 1) first, then
//! azimuth (motor 0), and the two frames of one move are never interleaved
//! with anything else.

pub mod cancel;
pub mod coords;
pub mod device;
pub mod error;
pub mod imu;
pub mod protocol;
pub mod scan;
pub mod tracking;
pub mod transport;

pub use cancel::CancelToken;
pub use device::{JogSpeed, MountDevice};
pub use error::{MountError, Result};
pub use ephemeris::HorizontalCoordinates;
pub use scan::{ScanConfig, ScanOutcome};
pub use tracking::{TrackConfig, TrackOutcome};
pub use transport::{SerialTransport, Transport};

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coords::MotorTicks;
use crate::imu::ImuSample;
use crate::protocol::Axis;
use ephemeris::EphemerisProvider;

/// Degrees one jog keypress moves the target by default.
pub const DEFAULT_JOG_STEP_DEG: f64 = 0.05;

/// Settle floor after a jog move.
const JOG_SETTLE_BASE: Duration = Duration::from_millis(300);

/// Extra settle per degree of azimuth distance from the last commanded
/// target. The azimuth stage is the slow one; altitude keeps up for free.
const JOG_SETTLE_PER_DEG: Duration = Duration::from_millis(500);

/// Additive corrections applied to every ephemeris-derived target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationOffsets {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

impl CalibrationOffsets {
    /// Fold the offsets into a raw ephemeris position.
    pub fn apply(&self, position: HorizontalCoordinates) -> HorizontalCoordinates {
        HorizontalCoordinates::new(
            position.altitude_deg + self.altitude_deg,
            position.azimuth_deg + self.azimuth_deg,
        )
    }
}

/// Outcome of one commanded move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    /// Both axis frames were written.
    Moved { ticks: MotorTicks },
    /// The altitude ceiling refused the target; nothing was written.
    Rejected { requested_alt_deg: f64 },
}

impl MoveOutcome {
    pub fn was_rejected(&self) -> bool {
        matches!(self, MoveOutcome::Rejected { .. })
    }
}

/// Outcome of resolving and slewing to a named target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetOutcome {
    /// The corrected position that was commanded, and how the move went.
    Acquired {
        commanded: HorizontalCoordinates,
        move_outcome: MoveOutcome,
    },
    /// The object is below the horizon; nothing was commanded.
    BelowHorizon { altitude_deg: f64 },
}

/// Direction of one jog nudge, as seen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Owner of the mount's pointing state and the only writer to its controller.
pub struct PointingEngine<T: Transport> {
    device: MountDevice<T>,
    pointing: HorizontalCoordinates,
    offsets: CalibrationOffsets,
    last_commanded: HorizontalCoordinates,
    jog_step_deg: f64,
    mirror: bool,
    jog_speed: JogSpeed,
}

impl<T: Transport> PointingEngine<T> {
    /// Bring the controller to a known state and hand back the engine.
    ///
    /// Seeds the position counter so the mount's current attitude reads as
    /// `reference` without anything moving, then selects slow jog speed and
    /// normal (non-mirrored) joystick sense. A mount powered up against its
    /// home stop passes [`HorizontalCoordinates::ZERO`].
    pub fn initialize(transport: T, reference: HorizontalCoordinates) -> Result<Self> {
        let mut engine = Self {
            device: MountDevice::new(transport),
            pointing: reference,
            offsets: CalibrationOffsets::default(),
            last_commanded: HorizontalCoordinates::ZERO,
            jog_step_deg: DEFAULT_JOG_STEP_DEG,
            mirror: false,
            jog_speed: JogSpeed::Slow,
        };
        info!("seeding position counter at {reference}");
        engine.seed_position(reference)?;
        engine.device.set_jog_speed(JogSpeed::Slow)?;
        engine.device.set_mirror(false)?;
        info!("mount ready");
        Ok(engine)
    }

    /// Overwrite the controller's position counter so the mount reads as
    /// sitting at `attitude`. Nothing moves.
    pub fn seed_position(&mut self, attitude: HorizontalCoordinates) -> Result<()> {
        let ticks = coords::seed_ticks(attitude);
        self.device.seed_axis(Axis::Altitude, ticks.altitude)?;
        self.pointing.altitude_deg = attitude.altitude_deg;
        self.device.seed_axis(Axis::Azimuth, ticks.azimuth)?;
        self.pointing.azimuth_deg = attitude.azimuth_deg;
        Ok(())
    }

    /// Command an absolute move through the normalization pipeline.
    ///
    /// Altitude goes out first, then azimuth, and the pointing belief follows
    /// each accepted write, so a transport failure between the two leaves the
    /// belief matching what the controller actually heard. A target past the
    /// altitude ceiling is dropped whole, with neither axis written.
    pub fn slew_to(&mut self, target: HorizontalCoordinates) -> Result<MoveOutcome> {
        let ticks = match coords::move_ticks(target) {
            Ok(ticks) => ticks,
            Err(range) => {
                warn!("move dropped: {range}");
                return Ok(MoveOutcome::Rejected {
                    requested_alt_deg: target.altitude_deg,
                });
            }
        };
        self.device.move_axis(Axis::Altitude, ticks.altitude)?;
        self.pointing.altitude_deg = target.altitude_deg;
        self.device.move_axis(Axis::Azimuth, ticks.azimuth)?;
        self.pointing.azimuth_deg = target.azimuth_deg;
        debug!("pointing {target}");
        Ok(MoveOutcome::Moved { ticks })
    }

    /// Resolve `name` through the provider and slew to it.
    ///
    /// The calibration offsets are folded into the commanded position, and
    /// the corrected position becomes the last-commanded baseline. A target
    /// below the horizon commands nothing and changes no state.
    pub fn goto_target(
        &mut self,
        provider: &dyn EphemerisProvider,
        name: &str,
    ) -> Result<TargetOutcome> {
        let position = provider.apparent_position(name)?;
        if position.is_below_horizon() {
            info!(
                "{name} is below the horizon (altitude {:.2}°)",
                position.altitude_deg
            );
            return Ok(TargetOutcome::BelowHorizon {
                altitude_deg: position.altitude_deg,
            });
        }
        info!("{name} at {position}");
        let (commanded, move_outcome) = self.command_corrected(position)?;
        Ok(TargetOutcome::Acquired {
            commanded,
            move_outcome,
        })
    }

    /// Apply the offsets, record the baseline, fire the move.
    pub(crate) fn command_corrected(
        &mut self,
        position: HorizontalCoordinates,
    ) -> Result<(HorizontalCoordinates, MoveOutcome)> {
        let corrected = self.offsets.apply(position);
        self.last_commanded = corrected;
        let outcome = self.slew_to(corrected)?;
        Ok((corrected, outcome))
    }

    /// Fold the operator's jog corrections into the calibration offsets.
    ///
    /// Compares where the operator steered the mount (the pointing belief)
    /// against the last ephemeris-derived command, per axis. An axis whose
    /// current reading is exactly zero keeps its previous offset, so running
    /// this before the mount has been pointed is a no-op. The flip side: a
    /// correction made while an axis genuinely reads zero is not captured.
    pub fn calibrate(&mut self) -> CalibrationOffsets {
        self.offsets = compute_offsets(self.pointing, self.last_commanded, self.offsets);
        info!(
            "offsets now alt {:+.4}°, az {:+.4}°",
            self.offsets.altitude_deg, self.offsets.azimuth_deg
        );
        self.offsets
    }

    /// Nudge the pointing one step and wait for the mount to settle.
    ///
    /// In mirror mode the altitude sense flips so "up" matches what the
    /// operator sees through the optics. The settle wait grows with the
    /// azimuth distance from the last commanded target, the same pacing the
    /// mount itself needs to close that distance.
    pub fn jog(&mut self, direction: JogDirection) -> Result<MoveOutcome> {
        let step = self.jog_step_deg;
        let alt_step = if self.mirror { -step } else { step };
        let mut target = self.pointing;
        match direction {
            JogDirection::Up => target.altitude_deg += alt_step,
            JogDirection::Down => target.altitude_deg -= alt_step,
            JogDirection::Left => target.azimuth_deg -= step,
            JogDirection::Right => target.azimuth_deg += step,
        }
        let outcome = self.slew_to(target)?;

        let az_delta = (self.pointing.azimuth_deg - self.last_commanded.azimuth_deg).abs();
        let settle = JOG_SETTLE_BASE + JOG_SETTLE_PER_DEG.mul_f64(az_delta);
        thread::sleep(settle);
        Ok(outcome)
    }

    /// Drive both axes back to the zero reference.
    pub fn home(&mut self) -> Result<MoveOutcome> {
        info!("homing mount");
        self.slew_to(HorizontalCoordinates::ZERO)
    }

    /// One-shot coarse alignment from the inertial sensor.
    ///
    /// Reads one averaged sample, then seeds the position counter and the
    /// pointing belief from the reported attitude. The mount does not move;
    /// fine alignment stays the operator's job.
    pub fn align_from_sensor(&mut self) -> Result<ImuSample> {
        let sample = self.device.read_imu_sample()?;
        let attitude = HorizontalCoordinates::new(
            f64::from(sample.altitude_deg),
            f64::from(sample.azimuth_deg),
        );
        info!("aligning to sensor attitude {attitude}");
        self.seed_position(attitude)?;
        Ok(sample)
    }

    pub fn set_jog_speed(&mut self, speed: JogSpeed) -> Result<()> {
        self.device.set_jog_speed(speed)?;
        self.jog_speed = speed;
        Ok(())
    }

    pub fn set_mirror(&mut self, on: bool) -> Result<()> {
        self.device.set_mirror(on)?;
        self.mirror = on;
        Ok(())
    }

    pub fn set_joystick(&mut self, enabled: bool) -> Result<()> {
        self.device.set_joystick(enabled)
    }

    /// Set the per-press jog step, degrees.
    pub fn set_jog_step(&mut self, step_deg: f64) {
        self.jog_step_deg = step_deg;
    }

    // ==================== State Accessors ====================

    /// Where the engine believes the mount is pointed.
    pub fn pointing(&self) -> HorizontalCoordinates {
        self.pointing
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }

    /// Offset-added target of the most recent ephemeris-derived move.
    pub fn last_commanded(&self) -> HorizontalCoordinates {
        self.last_commanded
    }

    pub fn jog_step_deg(&self) -> f64 {
        self.jog_step_deg
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn jog_speed(&self) -> JogSpeed {
        self.jog_speed
    }
}

/// Offset update rule: per axis, `offset = current - last commanded`, skipping
/// any axis whose current reading is exactly zero.
fn compute_offsets(
    current: HorizontalCoordinates,
    last_commanded: HorizontalCoordinates,
    previous: CalibrationOffsets,
) -> CalibrationOffsets {
    let mut next = previous;
    if current.altitude_deg != 0.0 {
        next.altitude_deg = current.altitude_deg - last_commanded.altitude_deg;
    }
    if current.azimuth_deg != 0.0 {
        next.azimuth_deg = current.azimuth_deg - last_commanded.azimuth_deg;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use approx::assert_relative_eq;

    #[test]
    fn offsets_replace_rather_than_accumulate() {
        let first = compute_offsets(
            HorizontalCoordinates::new(12.0, 30.5),
            HorizontalCoordinates::new(10.0, 30.0),
            CalibrationOffsets::default(),
        );
        assert_relative_eq!(first.altitude_deg, 2.0);
        assert_relative_eq!(first.azimuth_deg, 0.5);

        let second = compute_offsets(
            HorizontalCoordinates::new(11.0, 30.25),
            HorizontalCoordinates::new(10.0, 30.0),
            first,
        );
        assert_relative_eq!(second.altitude_deg, 1.0);
        assert_relative_eq!(second.azimuth_deg, 0.25);
    }

    #[test]
    fn zero_axis_keeps_its_previous_offset() {
        let offsets = compute_offsets(
            HorizontalCoordinates::new(12.0, 0.0),
            HorizontalCoordinates::new(10.0, 5.0),
            CalibrationOffsets::default(),
        );
        assert_relative_eq!(offsets.altitude_deg, 2.0);
        assert_relative_eq!(offsets.azimuth_deg, 0.0);

        let kept = compute_offsets(
            HorizontalCoordinates::new(0.0, 7.0),
            HorizontalCoordinates::new(3.0, 4.0),
            CalibrationOffsets {
                altitude_deg: 1.0,
                azimuth_deg: 2.0,
            },
        );
        assert_relative_eq!(kept.altitude_deg, 1.0);
        assert_relative_eq!(kept.azimuth_deg, 3.0);
    }

    #[test]
    fn jog_steps_follow_the_operator_frame() {
        let mock = MockTransport::new();
        let mut engine =
            PointingEngine::initialize(mock.clone(), HorizontalCoordinates::ZERO).unwrap();

        engine.jog(JogDirection::Right).unwrap();
        assert_relative_eq!(engine.pointing().azimuth_deg, DEFAULT_JOG_STEP_DEG);

        engine.jog(JogDirection::Up).unwrap();
        assert_relative_eq!(engine.pointing().altitude_deg, DEFAULT_JOG_STEP_DEG);
    }

    #[test]
    fn mirror_mode_flips_only_the_altitude_sense() {
        let mock = MockTransport::new();
        let mut engine =
            PointingEngine::initialize(mock.clone(), HorizontalCoordinates::ZERO).unwrap();
        engine.set_mirror(true).unwrap();

        engine.jog(JogDirection::Up).unwrap();
        assert_relative_eq!(engine.pointing().altitude_deg, -DEFAULT_JOG_STEP_DEG);

        engine.jog(JogDirection::Right).unwrap();
        assert_relative_eq!(engine.pointing().azimuth_deg, DEFAULT_JOG_STEP_DEG);
    }
}
