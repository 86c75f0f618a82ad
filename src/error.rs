//! Engine error types

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of a single outbound provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network-level failure, including per-call timeouts
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// Provider-side throttling signal
    #[error("provider rate limited the request")]
    RateLimited,

    /// Paid quota exhausted; terminal for the whole run
    #[error("provider quota exceeded")]
    QuotaExceeded,

    /// Unusable request or response for this cell only
    #[error("malformed request or response: {message}")]
    Malformed { message: String },
}

impl ProviderError {
    /// Whether the retry policy may re-attempt this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport { .. } | ProviderError::RateLimited
        )
    }

    /// Whether this failure must abort the remaining cells of the run
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded)
    }
}

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("search area radius must be positive and finite, got {radius_m}")]
    InvalidRadius { radius_m: f64 },

    #[error("cell budget must be between 1 and {max}, got {max_cells}")]
    InvalidCellBudget { max_cells: usize, max: usize },

    #[error("invalid configuration: {field}")]
    InvalidConfiguration { field: String },

    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
