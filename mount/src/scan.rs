//! Raster scanning around the current pointing.
//!
//! When a target should be in the field but is not, the operator scans a
//! small angular neighborhood: an N×N grid of offsets walked boustrophedon,
//! so consecutive cells are always adjacent and the mount never sweeps back
//! across the grid. Dwell at each cell grows with the azimuth distance from
//! the scan center, giving the slow axis time to arrive before the operator
//! looks.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::{sleep_unless_cancelled, CancelToken};
use crate::error::MountError;
use crate::transport::Transport;
use crate::{MoveOutcome, PointingEngine};
use ephemeris::HorizontalCoordinates;

/// Dwell floor per cell.
pub const DWELL_BASE: Duration = Duration::from_millis(750);

/// Extra dwell per degree of azimuth offset from the scan center.
pub const DWELL_PER_DEG: Duration = Duration::from_millis(500);

/// Parameters for one raster scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    /// Cells per side; the grid is `matrix_size × matrix_size`.
    pub matrix_size: usize,
    /// Angular pitch between adjacent cells, degrees.
    pub step_deg: f64,
    /// Dwell floor per cell.
    pub dwell_base: Duration,
    /// Extra dwell per degree of azimuth offset from the scan center.
    pub dwell_per_deg: Duration,
}

impl ScanConfig {
    /// A grid with the standard dwell pacing.
    pub fn new(matrix_size: usize, step_deg: f64) -> Self {
        Self {
            matrix_size,
            step_deg,
            dwell_base: DWELL_BASE,
            dwell_per_deg: DWELL_PER_DEG,
        }
    }

    /// Check the operator-facing bounds. The session itself trusts its
    /// config; whoever builds one from user input calls this first.
    pub fn validate(&self) -> std::result::Result<(), ScanConfigError> {
        if self.matrix_size % 2 == 0 || self.matrix_size < 3 || self.matrix_size > 99 {
            return Err(ScanConfigError::BadMatrixSize(self.matrix_size));
        }
        if !(self.step_deg > 0.0 && self.step_deg < 5.0) {
            return Err(ScanConfigError::BadStepSize(self.step_deg));
        }
        Ok(())
    }
}

/// Rejected scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScanConfigError {
    #[error("matrix size {0} must be an odd number from 3 to 99")]
    BadMatrixSize(usize),
    #[error("step size {0}° must be above 0 and below 5")]
    BadStepSize(f64),
}

/// How a scan session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every cell was visited and the mount was sent back to the scan start.
    Completed { cells_visited: usize },
    /// Cancelled mid-walk; the mount stays on the last visited cell so the
    /// operator can mark what they just saw.
    Cancelled { cells_visited: usize },
}

/// One grid cell in visiting order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScanCell {
    pub row: usize,
    pub col: usize,
    pub altitude_offset_deg: f64,
    pub azimuth_offset_deg: f64,
}

/// Cells in boustrophedon order: even rows left to right, odd rows reversed.
///
/// Rows run over altitude, columns over azimuth. Offsets are
/// `(index - matrix_size/2) * step`, so the center cell of an odd grid is
/// exactly the scan start.
pub(crate) fn traversal(config: &ScanConfig) -> Vec<ScanCell> {
    let n = config.matrix_size;
    let half = (n / 2) as f64;
    let offset = |index: usize| (index as f64 - half) * config.step_deg;

    let mut cells = Vec::with_capacity(n * n);
    for row in 0..n {
        let columns: Vec<usize> = if row % 2 == 0 {
            (0..n).collect()
        } else {
            (0..n).rev().collect()
        };
        for col in columns {
            cells.push(ScanCell {
                row,
                col,
                altitude_offset_deg: offset(row),
                azimuth_offset_deg: offset(col),
            });
        }
    }
    cells
}

impl<T: Transport> PointingEngine<T> {
    /// Walk a raster grid centered on the current pointing.
    ///
    /// The scan frame is fixed at session start: cell targets and dwell
    /// distances are measured from that snapshot, not from the moving
    /// pointing belief. Cancellation is honored between cells and inside
    /// every dwell tick; a cancelled scan leaves the mount where it is, a
    /// completed one returns to the start. A cell past the altitude ceiling
    /// is skipped in place but still dwelt on, keeping the cadence even.
    pub fn run_scan(
        &mut self,
        config: &ScanConfig,
        token: &CancelToken,
    ) -> std::result::Result<ScanOutcome, MountError> {
        let start = self.pointing();
        let cells = traversal(config);
        info!(
            "scanning {}x{} cells at {:.3}° pitch around {start}",
            config.matrix_size, config.matrix_size, config.step_deg
        );

        let mut visited = 0;
        for cell in &cells {
            if token.is_cancelled() {
                info!("scan cancelled before cell ({}, {})", cell.row, cell.col);
                return Ok(ScanOutcome::Cancelled {
                    cells_visited: visited,
                });
            }

            let target = HorizontalCoordinates::new(
                start.altitude_deg + cell.altitude_offset_deg,
                start.azimuth_deg + cell.azimuth_offset_deg,
            );
            let outcome = self.slew_to(target)?;
            if let MoveOutcome::Rejected { requested_alt_deg } = outcome {
                warn!(
                    "cell ({}, {}) at altitude {requested_alt_deg:.3}° is unreachable, dwelling in place",
                    cell.row, cell.col
                );
            }
            visited += 1;

            let dwell = config.dwell_base
                + config.dwell_per_deg.mul_f64(cell.azimuth_offset_deg.abs());
            debug!("cell ({}, {}): {target}, dwell {dwell:?}", cell.row, cell.col);
            if !sleep_unless_cancelled(token, dwell) {
                info!("scan cancelled on cell ({}, {})", cell.row, cell.col);
                return Ok(ScanOutcome::Cancelled {
                    cells_visited: visited,
                });
            }
        }

        if token.is_cancelled() {
            return Ok(ScanOutcome::Cancelled {
                cells_visited: visited,
            });
        }
        info!("scan complete, returning to {start}");
        self.slew_to(start)?;
        Ok(ScanOutcome::Completed {
            cells_visited: visited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn traversal_snakes_through_a_three_grid() {
        let cells = traversal(&ScanConfig::new(3, 1.0));
        let order: Vec<(usize, usize)> = cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(
            order,
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 2),
                (1, 1),
                (1, 0),
                (2, 0),
                (2, 1),
                (2, 2),
            ]
        );
    }

    #[test]
    fn offsets_center_the_grid_on_zero() {
        let cells = traversal(&ScanConfig::new(3, 0.1));
        assert_relative_eq!(cells[0].altitude_offset_deg, -0.1);
        assert_relative_eq!(cells[0].azimuth_offset_deg, -0.1);

        // Center cell of an odd grid sits exactly on the start.
        let center = cells.iter().find(|c| c.row == 1 && c.col == 1).unwrap();
        assert_eq!(center.altitude_offset_deg, 0.0);
        assert_eq!(center.azimuth_offset_deg, 0.0);

        assert_relative_eq!(cells.last().unwrap().azimuth_offset_deg, 0.1);
    }

    #[test]
    fn validation_bounds_match_the_operator_prompts() {
        assert!(ScanConfig::new(3, 0.021).validate().is_ok());
        assert!(ScanConfig::new(99, 4.999).validate().is_ok());

        assert_eq!(
            ScanConfig::new(4, 1.0).validate(),
            Err(ScanConfigError::BadMatrixSize(4))
        );
        assert_eq!(
            ScanConfig::new(1, 1.0).validate(),
            Err(ScanConfigError::BadMatrixSize(1))
        );
        assert_eq!(
            ScanConfig::new(101, 1.0).validate(),
            Err(ScanConfigError::BadMatrixSize(101))
        );
        assert_eq!(
            ScanConfig::new(5, 0.0).validate(),
            Err(ScanConfigError::BadStepSize(0.0))
        );
        assert_eq!(
            ScanConfig::new(5, 5.0).validate(),
            Err(ScanConfigError::BadStepSize(5.0))
        );
    }
}
