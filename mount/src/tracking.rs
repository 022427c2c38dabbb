//! Fixed-cadence target following.
//!
//! Tracking does not command velocity; it re-points. Each cadence interval
//! the loop asks the provider where the target is now, folds in the
//! calibration offsets, and fires a fresh absolute move. Solar-system bodies
//! drift a few arcminutes per cadence at most, well inside the field, so the
//! mount is simply assumed to finish each slew before the next one.

use std::time::Duration;

use tracing::{info, warn};

use crate::cancel::{sleep_unless_cancelled, CancelToken};
use crate::error::MountError;
use crate::transport::Transport;
use crate::PointingEngine;
use ephemeris::EphemerisProvider;

/// Default interval between re-points.
pub const TRACK_CADENCE: Duration = Duration::from_secs(10);

/// Pacing for a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackConfig {
    /// Time between re-points.
    pub cadence: Duration,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            cadence: TRACK_CADENCE,
        }
    }
}

/// Tally of a finished tracking session. Tracking runs until told to stop,
/// so the only non-error ending is cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackOutcome {
    /// Re-points actually commanded.
    pub moves_issued: u32,
    /// Cycles that held position: target unavailable, below the horizon, or
    /// past the altitude ceiling.
    pub cycles_skipped: u32,
}

impl<T: Transport> PointingEngine<T> {
    /// Follow `name` until the token fires.
    ///
    /// One lookup and at most one move per cadence interval. A failed lookup
    /// or a below-horizon position skips that cycle's move and keeps the
    /// session alive; transport failures end it, position unknown.
    pub fn run_tracking(
        &mut self,
        provider: &dyn EphemerisProvider,
        name: &str,
        config: &TrackConfig,
        token: &CancelToken,
    ) -> std::result::Result<TrackOutcome, MountError> {
        info!("tracking {name}, re-pointing every {:?}", config.cadence);
        let mut tally = TrackOutcome::default();

        while !token.is_cancelled() {
            match provider.apparent_position(name) {
                Ok(position) if position.is_below_horizon() => {
                    warn!(
                        "{name} below the horizon (altitude {:.2}°), holding",
                        position.altitude_deg
                    );
                    tally.cycles_skipped += 1;
                }
                Ok(position) => {
                    let (_, outcome) = self.command_corrected(position)?;
                    if outcome.was_rejected() {
                        tally.cycles_skipped += 1;
                    } else {
                        tally.moves_issued += 1;
                    }
                }
                Err(err) => {
                    warn!("lookup failed ({err}), holding");
                    tally.cycles_skipped += 1;
                }
            }

            if !sleep_unless_cancelled(token, config.cadence) {
                break;
            }
        }

        info!(
            "tracking stopped: {} re-points, {} held cycles",
            tally.moves_issued, tally.cycles_skipped
        );
        Ok(tally)
    }
}
