//! Core data types for grid search runs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a search run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A geographic point in decimal degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// The circular area a caller wants searched
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchArea {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl SearchArea {
    pub fn new(center: Coordinate, radius_m: f64) -> Self {
        Self { center, radius_m }
    }
}

/// One sub-region of the planned grid
///
/// Cells are produced once per run in row-major order and never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Position in the row-major traversal (0..N-1)
    pub index: usize,
    pub center: Coordinate,
    pub radius_m: f64,
    /// Seam margin shared with edge-adjacent cells
    pub overlap_fraction: f64,
}

/// One raw result returned by a provider call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Provider-assigned unique place identifier (dedup key)
    pub place_id: String,
    pub name: String,
    pub location: Coordinate,
    pub categories: Vec<String>,
    /// Remaining provider fields, carried opaquely for downstream stages
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Caller-supplied knobs forwarded to the provider per sub-query
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Pagination depth per sub-query (each page is a separate billed call
    /// on some providers, so callers can trade coverage for cost)
    pub max_pages: u32,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self { max_pages: 3 }
    }
}

/// Outbound request handed to a [`crate::traits::SearchProvider`]
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderQuery {
    pub query: String,
    pub center: Coordinate,
    pub radius_m: f64,
    /// Field projection string; restricts billing to fields we consume
    pub field_mask: &'static str,
    pub max_pages: u32,
}

/// Run-level lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    PartialSuccess,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::PartialSuccess
                | RunStatus::Failed
                | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::PartialSuccess => "partial_success",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Terminal state of a single grid cell within a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CellOutcome {
    Pending,
    Succeeded { new_records: usize },
    Failed { reason: String },
    /// Never dispatched: run was cancelled or quota was exhausted first
    Skipped,
}

/// Incremental event emitted on a run's progress stream
///
/// For one cell, `CellStarted` always precedes its terminal event; across
/// cells only emission order holds. Skipped cells emit nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ProgressEvent {
    CellStarted {
        index: usize,
    },
    CellCompleted {
        index: usize,
        new_records: usize,
    },
    CellFailed {
        index: usize,
        reason: String,
    },
    RunCompleted {
        total_records: usize,
        failed_cells: usize,
    },
}

/// Snapshot of one grid search run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRun {
    pub id: RunId,
    pub query: String,
    pub area: SearchArea,
    pub status: RunStatus,
    pub cells: Vec<GridCell>,
    pub cell_outcomes: Vec<CellOutcome>,
    /// Admitted records in first-admission order
    pub records: Vec<CandidateRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchRun {
    /// Count of cells with a `Failed` outcome
    pub fn failed_cells(&self) -> usize {
        self.cell_outcomes
            .iter()
            .filter(|o| matches!(o, CellOutcome::Failed { .. }))
            .count()
    }

    /// Count of cells with a `Succeeded` outcome
    pub fn succeeded_cells(&self) -> usize {
        self.cell_outcomes
            .iter()
            .filter(|o| matches!(o, CellOutcome::Succeeded { .. }))
            .count()
    }

    pub fn skipped_cells(&self) -> usize {
        self.cell_outcomes
            .iter()
            .filter(|o| matches!(o, CellOutcome::Skipped))
            .count()
    }
}
