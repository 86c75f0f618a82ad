//! Grid search orchestration for places-search providers
//!
//! Splits a circular search area into overlapping sub-region cells, fans the
//! sub-queries out under a shared rolling-window rate limit, deduplicates
//! results by provider place id, and streams per-cell progress to any number
//! of subscribers while the run is in flight.
//!
//! The entry point is [`SearchOrchestrator`]; plug in a [`SearchProvider`]
//! implementation (the bundled [`GooglePlacesProvider`] or your own) and call
//! [`SearchOrchestrator::start`] for a [`SearchHandle`].

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;

pub use config::EngineConfig;
pub use core::{Deduplicator, GridPlanner, RateLimiter};
pub use error::{EngineError, EngineResult, ProviderError};
pub use orchestrator::{SearchHandle, SearchOrchestrator};
pub use services::{GooglePlacesProvider, ProviderClient, TEXT_SEARCH_FIELD_MASK};
pub use state::{CancelFlag, ProgressStream};
pub use traits::SearchProvider;
pub use types::{
    CandidateRecord, CellOutcome, Coordinate, GridCell, ProgressEvent, ProviderQuery, RunId,
    RunStatus, SearchArea, SearchFilters, SearchRun,
};
