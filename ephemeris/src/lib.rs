//! Apparent sky positions for mount pointing.
//!
//! The pointing engine asks a provider "where is this object right now?" and
//! gets back an apparent (altitude, azimuth) pair in degrees for the observer
//! site. Two providers ship with the crate:
//!
//! - [`StellariumProvider`] queries a running Stellarium instance over its
//!   remote-control HTTP API.
//! - [`FixedEphemeris`] plays back scripted positions, for tests and bench
//!   runs without a sky.

pub mod fixed;
pub mod stellarium;

pub use fixed::FixedEphemeris;
pub use stellarium::StellariumProvider;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Apparent position in the horizontal frame, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalCoordinates {
    /// Elevation above the horizon. Negative means below it.
    pub altitude_deg: f64,
    /// Compass bearing, clockwise from north, 0 to 360.
    pub azimuth_deg: f64,
}

impl HorizontalCoordinates {
    pub const ZERO: Self = Self {
        altitude_deg: 0.0,
        azimuth_deg: 0.0,
    };

    pub fn new(altitude_deg: f64, azimuth_deg: f64) -> Self {
        Self {
            altitude_deg,
            azimuth_deg,
        }
    }

    /// True when the object cannot be pointed at from the ground.
    pub fn is_below_horizon(&self) -> bool {
        self.altitude_deg < 0.0
    }
}

impl fmt::Display for HorizontalCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alt {:.3}°, az {:.3}°",
            self.altitude_deg, self.azimuth_deg
        )
    }
}

/// Geodetic site the apparent positions are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverLocation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
}

/// Observatory site. Stellarium must be configured for the same location or
/// its altitudes and azimuths will not match the mount's sky.
pub const DEFAULT_SITE: ObserverLocation = ObserverLocation {
    latitude_deg: 33.142_400_5,
    longitude_deg: -96.859_967_3,
    elevation_m: 0.0,
};

/// Solar-system bodies the operator can select by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Body {
    Moon,
    Mars,
    Jupiter,
    Saturn,
    Mercury,
    Venus,
    Sun,
}

/// Errors a position provider can raise.
#[derive(Debug, Error)]
pub enum EphemerisError {
    /// The backend does not know the requested object.
    #[error("object not found: {name}")]
    ObjectNotFound { name: String },

    /// The backend could not be reached at all.
    #[error("position service unreachable: {0}")]
    ServiceUnreachable(String),

    /// The backend answered with something we cannot interpret.
    #[error("malformed position response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, EphemerisError>;

/// Source of apparent positions for named objects.
///
/// Implementations answer for "right now"; the caller decides how often to
/// re-ask. Lookups take `&self` so a provider can be shared across threads.
pub trait EphemerisProvider {
    /// Current apparent position of `name` for the provider's site.
    fn apparent_position(&self, name: &str) -> Result<HorizontalCoordinates>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn body_names_round_trip() {
        for body in Body::iter() {
            let name = body.to_string();
            assert_eq!(Body::from_str(&name).unwrap(), body);
        }
        assert_eq!(Body::from_str("Jupiter").unwrap(), Body::Jupiter);
        assert!(Body::from_str("pluto").is_err());
    }

    #[test]
    fn catalog_is_lowercase_on_the_wire() {
        assert_eq!(Body::Moon.to_string(), "moon");
        assert_eq!(Body::Sun.to_string(), "sun");
    }

    #[test]
    fn below_horizon_is_strict() {
        assert!(HorizontalCoordinates::new(-0.1, 10.0).is_below_horizon());
        assert!(!HorizontalCoordinates::new(0.0, 10.0).is_below_horizon());
    }
}
