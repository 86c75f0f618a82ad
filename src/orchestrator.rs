//! Run lifecycle driver: plans the grid, fans out cell tasks, settles status
//!
//! One orchestrator serves many concurrent runs; per-run state lives in
//! [`RunState`] and the orchestrator only holds the shared rate limiter and
//! configuration. Cells run as independent tokio tasks so the rate limiter,
//! not task scheduling, is the throughput governor.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::core::{GridPlanner, RateLimiter};
use crate::error::EngineResult;
use crate::services::provider::ProviderClient;
use crate::state::{ProgressStream, RunState};
use crate::traits::SearchProvider;
use crate::types::{
    CellOutcome, ProgressEvent, RunId, RunStatus, SearchArea, SearchFilters, SearchRun,
};

/// Caller-facing handle to one in-flight (or finished) run
#[derive(Clone)]
pub struct SearchHandle {
    state: Arc<RunState>,
}

impl SearchHandle {
    pub fn id(&self) -> RunId {
        self.state.id
    }

    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    /// Attach a progress stream; events are visible from this moment onward
    pub async fn subscribe(&self) -> ProgressStream {
        self.state.subscribe().await
    }

    /// Cooperatively cancel the run; in-flight provider calls still finish
    pub fn cancel(&self) {
        self.state.request_cancel();
    }

    /// Wait for the run to settle and return its final snapshot
    pub async fn result(&self) -> SearchRun {
        self.state.final_snapshot().await
    }

    /// Point-in-time view of the run, terminal or not
    pub fn snapshot(&self) -> SearchRun {
        self.state.snapshot()
    }
}

/// Plans and drives grid search runs against one provider
pub struct SearchOrchestrator {
    provider: Arc<dyn SearchProvider>,
    config: EngineConfig,
    limiter: Arc<RateLimiter>,
    planner: GridPlanner,
}

impl SearchOrchestrator {
    /// The rate limiter is shared across every run this orchestrator starts,
    /// so concurrent runs jointly respect the provider's request budget.
    pub fn new(provider: Arc<dyn SearchProvider>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.max_requests_per_second));
        let planner = GridPlanner::new(&config);
        Ok(Self {
            provider,
            config,
            limiter,
            planner,
        })
    }

    /// Start a run; planning failures surface here before anything executes
    pub fn start(
        &self,
        area: SearchArea,
        query: &str,
        filters: SearchFilters,
        max_cells: usize,
    ) -> EngineResult<SearchHandle> {
        let cells = self.planner.plan(&area, max_cells)?;
        let state = RunState::new(query.to_string(), area, cells);
        tracing::info!(
            run_id = %state.id,
            query,
            cells = state.cells.len(),
            radius_m = area.radius_m,
            "starting grid search run"
        );

        let client = Arc::new(ProviderClient::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.limiter),
            &self.config,
        ));
        let driver_state = Arc::clone(&state);
        tokio::spawn(async move {
            drive_run(driver_state, client, filters).await;
        });

        Ok(SearchHandle { state })
    }
}

/// Run one search to completion and settle its terminal status
async fn drive_run(state: Arc<RunState>, client: Arc<ProviderClient>, filters: SearchFilters) {
    state.set_status(RunStatus::Running);

    let mut tasks = JoinSet::new();
    for cell_index in 0..state.cells.len() {
        let state = Arc::clone(&state);
        let client = Arc::clone(&client);
        tasks.spawn(async move {
            process_cell(&state, &client, cell_index, filters).await;
        });
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            // A panicked cell task leaves its outcome Pending; the run
            // still settles with the other cells' results
            tracing::error!(run_id = %state.id, error = %e, "cell task join failed");
        }
    }

    let snapshot = state.snapshot();
    let failed = snapshot.failed_cells();
    let succeeded = snapshot.succeeded_cells();
    let status = if state.quota_tripped() {
        RunStatus::Failed
    } else if state.cancel_requested() {
        RunStatus::Cancelled
    } else if failed == 0 {
        RunStatus::Completed
    } else if succeeded > 0 {
        RunStatus::PartialSuccess
    } else {
        RunStatus::Failed
    };

    state
        .emit(ProgressEvent::RunCompleted {
            total_records: state.dedup.len(),
            failed_cells: failed,
        })
        .await;
    state.finalize(status);
    state.close_streams().await;
    tracing::info!(
        run_id = %state.id,
        %status,
        records = state.dedup.len(),
        failed_cells = failed,
        skipped_cells = state.snapshot().skipped_cells(),
        "run settled"
    );
}

/// Fetch one cell and record its outcome
///
/// A cell announces `CellStarted` only once it holds its first rate slot,
/// so skipped cells (pre-checked or standing down at the limiter when the
/// run aborts) emit nothing, and every started cell emits exactly one
/// terminal event.
async fn process_cell(
    state: &Arc<RunState>,
    client: &Arc<ProviderClient>,
    index: usize,
    filters: SearchFilters,
) {
    if state.should_skip_pending_work() {
        state.mark_cell(index, CellOutcome::Skipped);
        return;
    }

    let Some(permit) = client.acquire_slot(&state.abort).await else {
        state.mark_cell(index, CellOutcome::Skipped);
        return;
    };
    state.emit(ProgressEvent::CellStarted { index }).await;

    let cell = state.cells[index];
    match client
        .fetch(permit, &cell, &state.query, &filters, &state.abort)
        .await
    {
        Ok(records) => {
            let new_records = state.admit_all(records);
            state.mark_cell(index, CellOutcome::Succeeded { new_records });
            state
                .emit(ProgressEvent::CellCompleted { index, new_records })
                .await;
        }
        Err(error) => {
            if error.is_fatal_for_run() {
                tracing::warn!(run_id = %state.id, cell = index, "quota exhausted, aborting run");
                state.trip_quota();
            }
            let reason = error.to_string();
            state.mark_cell(index, CellOutcome::Failed { reason: reason.clone() });
            state.emit(ProgressEvent::CellFailed { index, reason }).await;
        }
    }
}
