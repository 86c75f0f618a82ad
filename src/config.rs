//! Engine configuration with environment overrides

use std::env;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Tunable knobs for a grid search engine instance
///
/// Defaults match the production deployment this engine was extracted from:
/// 5 outbound requests per second, 30 second call timeout, up to a 5x5 grid
/// with ~2km target cells and a 30% seam margin.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on provider calls granted in any rolling one-second window
    pub max_requests_per_second: u32,
    /// Per-call timeout; elapsing counts as a retryable transport failure
    pub call_timeout: Duration,
    /// Extra attempts after the first failed call (transport/throttle only)
    pub max_retries: u32,
    /// Hard cap on grid dimension k (k*k cells)
    pub max_grid_dimension: usize,
    /// Seam margin added on top of the coverage radius of each cell
    pub overlap_fraction: f64,
    /// Preferred cell radius the planner aims for before clamping
    pub target_cell_radius_m: f64,
    /// Results requested per provider page
    pub page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: 5,
            call_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_grid_dimension: 5,
            overlap_fraction: 0.3,
            target_cell_radius_m: 2_000.0,
            page_size: 20,
        }
    }
}

impl EngineConfig {
    /// Build a config from `PLACEGRID_*` environment variables, falling back
    /// to defaults for anything unset or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests_per_second: env_parse(
                "PLACEGRID_MAX_RPS",
                defaults.max_requests_per_second,
            ),
            call_timeout: Duration::from_secs(env_parse(
                "PLACEGRID_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )),
            max_retries: env_parse("PLACEGRID_MAX_RETRIES", defaults.max_retries),
            max_grid_dimension: env_parse(
                "PLACEGRID_MAX_GRID_DIMENSION",
                defaults.max_grid_dimension,
            ),
            overlap_fraction: env_parse("PLACEGRID_OVERLAP_FRACTION", defaults.overlap_fraction),
            target_cell_radius_m: env_parse(
                "PLACEGRID_TARGET_CELL_RADIUS_M",
                defaults.target_cell_radius_m,
            ),
            page_size: env_parse("PLACEGRID_PAGE_SIZE", defaults.page_size),
        }
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_requests_per_second == 0 {
            return Err(EngineError::InvalidConfiguration {
                field: "max_requests_per_second must be at least 1".to_string(),
            });
        }
        if self.call_timeout.is_zero() {
            return Err(EngineError::InvalidConfiguration {
                field: "call_timeout must be non-zero".to_string(),
            });
        }
        if self.max_grid_dimension == 0 {
            return Err(EngineError::InvalidConfiguration {
                field: "max_grid_dimension must be at least 1".to_string(),
            });
        }
        if !(self.overlap_fraction.is_finite() && self.overlap_fraction >= 0.0) {
            return Err(EngineError::InvalidConfiguration {
                field: "overlap_fraction must be finite and non-negative".to_string(),
            });
        }
        if !(self.target_cell_radius_m.is_finite() && self.target_cell_radius_m > 0.0) {
            return Err(EngineError::InvalidConfiguration {
                field: "target_cell_radius_m must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
