//! Degree-to-tick mapping for the motion controller.
//!
//! The controller counts actuator microsteps; one degree of axis travel is
//! [`TICKS_PER_DEGREE`] ticks. Move targets get the azimuth remap and sign
//! flip described on [`move_ticks`]; seeding the position counter uses the
//! plain wrap in [`seed_ticks`]. The two deliberately do not share a path.

use thiserror::Error;

use ephemeris::HorizontalCoordinates;

/// Actuator ticks per degree of axis travel.
pub const TICKS_PER_DEGREE: f64 = 25_600.0;

/// Highest altitude the mount may be commanded to.
pub const MAX_ALTITUDE_DEG: f64 = 90.0;

/// Absolute axis targets in controller ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorTicks {
    pub altitude: i32,
    pub azimuth: i32,
}

/// The requested altitude exceeds [`MAX_ALTITUDE_DEG`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("altitude {requested_deg}° is past the {MAX_ALTITUDE_DEG}° ceiling")]
pub struct RangeError {
    pub requested_deg: f64,
}

/// Map a sky-frame target to controller ticks for an absolute move.
///
/// Azimuths past 180° become the equivalent negative bearing so the azimuth
/// cable never wraps a full turn, the azimuth sign is inverted to match the
/// motor sense, and both axes round to the nearest tick. An altitude above
/// [`MAX_ALTITUDE_DEG`] is refused; the caller must drop the whole move
/// without writing either axis.
pub fn move_ticks(target: HorizontalCoordinates) -> Result<MotorTicks, RangeError> {
    let mut azimuth_deg = target.azimuth_deg;
    if azimuth_deg > 180.0 {
        azimuth_deg -= 360.0;
    }
    if target.altitude_deg > MAX_ALTITUDE_DEG {
        return Err(RangeError {
            requested_deg: target.altitude_deg,
        });
    }
    Ok(MotorTicks {
        altitude: degrees_to_ticks(target.altitude_deg),
        azimuth: degrees_to_ticks(-azimuth_deg),
    })
}

/// Map a mount attitude to ticks for seeding the position counter.
///
/// Negative angles wrap into [0, 360) independently per axis. No ceiling
/// check and no sign flip: the counter is overwritten, nothing moves.
pub fn seed_ticks(attitude: HorizontalCoordinates) -> MotorTicks {
    MotorTicks {
        altitude: degrees_to_ticks(wrap_non_negative(attitude.altitude_deg)),
        azimuth: degrees_to_ticks(wrap_non_negative(attitude.azimuth_deg)),
    }
}

fn wrap_non_negative(deg: f64) -> f64 {
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

fn degrees_to_ticks(deg: f64) -> i32 {
    (deg * TICKS_PER_DEGREE).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_scale_and_invert_azimuth() {
        let ticks = move_ticks(HorizontalCoordinates::new(10.0, 20.0)).unwrap();
        assert_eq!(ticks.altitude, 256_000);
        assert_eq!(ticks.azimuth, -512_000);
    }

    #[test]
    fn azimuth_past_180_takes_the_short_way() {
        // 270° east-about is 90° west-about; inverted sign makes it positive.
        let ticks = move_ticks(HorizontalCoordinates::new(0.0, 270.0)).unwrap();
        assert_eq!(ticks.azimuth, 2_304_000);
        assert_eq!(ticks.altitude, 0);
    }

    #[test]
    fn altitude_ceiling_is_inclusive() {
        let at_limit = move_ticks(HorizontalCoordinates::new(90.0, 0.0)).unwrap();
        assert_eq!(at_limit.altitude, 2_304_000);

        let err = move_ticks(HorizontalCoordinates::new(90.01, 0.0)).unwrap_err();
        assert_eq!(err.requested_deg, 90.01);
    }

    #[test]
    fn ticks_round_to_nearest() {
        // 0.021° is 537.6 ticks; truncation would land a half-tick short.
        let ticks = move_ticks(HorizontalCoordinates::new(0.021, 0.0)).unwrap();
        assert_eq!(ticks.altitude, 538);

        let ticks = move_ticks(HorizontalCoordinates::new(-0.021, 0.0)).unwrap();
        assert_eq!(ticks.altitude, -538);
    }

    #[test]
    fn seeding_wraps_negatives_per_axis() {
        let ticks = seed_ticks(HorizontalCoordinates::new(-10.0, 45.0));
        assert_eq!(ticks.altitude, 8_960_000); // 350°
        assert_eq!(ticks.azimuth, 1_152_000); // 45°, no sign flip
    }

    #[test]
    fn seeding_skips_the_ceiling_and_the_remap() {
        let ticks = seed_ticks(HorizontalCoordinates::new(100.0, 270.0));
        assert_eq!(ticks.altitude, 2_560_000);
        assert_eq!(ticks.azimuth, 6_912_000);
    }
}
