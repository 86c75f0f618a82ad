//! Grid planning: partitioning one search area into overlapping sub-regions
//!
//! Providers cap the results of a single query, so a large area is searched
//! as a k x k lattice of smaller circles. The planner is pure: identical
//! inputs always yield the identical row-major cell sequence, which keeps
//! dedup admission reproducible in sequential tests.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{Coordinate, GridCell, SearchArea};

/// Meters per degree of latitude (and of longitude at the equator)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Plans the sub-region lattice for a search run
#[derive(Clone, Debug)]
pub struct GridPlanner {
    max_grid_dimension: usize,
    overlap_fraction: f64,
    target_cell_radius_m: f64,
}

impl GridPlanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_grid_dimension: config.max_grid_dimension,
            overlap_fraction: config.overlap_fraction,
            target_cell_radius_m: config.target_cell_radius_m,
        }
    }

    /// Produce the ordered cell sequence covering `area`
    ///
    /// `max_cells` bounds the number of sub-queries the caller is willing to
    /// pay for; the realized grid is the largest k*k <= max_cells that the
    /// dimension cap allows, shrunk further when the area is small enough to
    /// need fewer cells. The union of the returned circles covers the area:
    /// lattice spacing is 2R/k per axis, and every point of the parent disk
    /// lies within sqrt(2) * R/k of some lattice center, so the sub-radius
    /// (R/k) * (sqrt(2) + overlap) closes all seams with margin to spare.
    pub fn plan(&self, area: &SearchArea, max_cells: usize) -> EngineResult<Vec<GridCell>> {
        if !(area.radius_m.is_finite() && area.radius_m > 0.0) {
            return Err(EngineError::InvalidRadius {
                radius_m: area.radius_m,
            });
        }
        let budget_cap = self.max_grid_dimension * self.max_grid_dimension;
        if max_cells == 0 || max_cells > budget_cap {
            return Err(EngineError::InvalidCellBudget {
                max_cells,
                max: budget_cap,
            });
        }
        if !(area.center.latitude.is_finite()
            && area.center.latitude.abs() <= 90.0
            && area.center.longitude.is_finite()
            && area.center.longitude.abs() <= 180.0)
        {
            return Err(EngineError::InvalidConfiguration {
                field: format!("area center out of range: {}", area.center),
            });
        }

        let k = self.grid_dimension(area.radius_m, max_cells);
        if k == 1 {
            return Ok(vec![GridCell {
                index: 0,
                center: area.center,
                radius_m: area.radius_m,
                overlap_fraction: self.overlap_fraction,
            }]);
        }

        let cell_radius_m =
            (area.radius_m / k as f64) * (std::f64::consts::SQRT_2 + self.overlap_fraction);
        let spacing_m = 2.0 * area.radius_m / k as f64;

        let lat_step = spacing_m / METERS_PER_DEGREE;
        // Longitude degrees shrink with latitude; clamp the cosine so polar
        // areas degrade instead of dividing by zero
        let lat_cos = area.center.latitude.to_radians().cos().max(0.01);
        let lng_step = spacing_m / (METERS_PER_DEGREE * lat_cos);

        let half = (k - 1) as f64 / 2.0;
        let mut cells = Vec::with_capacity(k * k);
        for row in 0..k {
            for col in 0..k {
                let index = row * k + col;
                cells.push(GridCell {
                    index,
                    center: Coordinate::new(
                        area.center.latitude + (row as f64 - half) * lat_step,
                        area.center.longitude + (col as f64 - half) * lng_step,
                    ),
                    radius_m: cell_radius_m,
                    overlap_fraction: self.overlap_fraction,
                });
            }
        }
        Ok(cells)
    }

    /// Pick the lattice dimension for the given radius and cell budget
    fn grid_dimension(&self, radius_m: f64, max_cells: usize) -> usize {
        let budget_k = (max_cells as f64).sqrt().floor() as usize;
        let cap = budget_k.min(self.max_grid_dimension).max(1);
        let wanted = (radius_m / self.target_cell_radius_m).ceil() as usize;
        wanted.clamp(1, cap)
    }
}
