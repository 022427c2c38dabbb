//! Error taxonomy for mount operations.

use thiserror::Error;

use crate::imu::FrameError;
use crate::transport::TransportError;

/// Errors that propagate out of mount operations.
///
/// Transport failures are fatal to the operation that hit them: the
/// controller gives no acknowledgments, so a lost command silently desyncs
/// the position counter from our pointing belief. Sensor and ephemeris
/// failures are recoverable and callers decide whether to retry.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("inertial sample rejected: {0}")]
    SensorFrame(#[from] FrameError),

    #[error("ephemeris lookup failed: {0}")]
    Ephemeris(#[from] ephemeris::EphemerisError),
}

pub type Result<T> = std::result::Result<T, MountError>;
