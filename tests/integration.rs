//! End-to-end run lifecycle tests against a scripted provider
//!
//! These drive the public orchestrator surface the way a caller would:
//! start a run, watch the progress stream, and inspect the settled result.

use std::collections::HashSet;
use std::sync::Arc;

use placegrid::{CellOutcome, EngineConfig, ProgressEvent, ProviderError, RunStatus, SearchFilters};

mod common;
use common::fixtures::records;
use common::{
    alexandria, area_km, collect_events, fast_config, orchestrator, wait_for_calls, Gate,
    ScriptedProvider,
};

/// Index of `event` in `events`, for ordering assertions
fn position(events: &[ProgressEvent], pred: impl Fn(&ProgressEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}

#[tokio::test]
async fn run_completes_and_streams_cell_events() {
    // 3.5km radius over 2km target cells plans a 2x2 grid
    let provider = Arc::new(ScriptedProvider::new(|n, _| Ok(records(n * 3..n * 3 + 5))));
    let orchestrator = orchestrator(Arc::clone(&provider), fast_config());

    let handle = orchestrator
        .start(area_km(31.2001, 29.9187, 3.5), "cafes", SearchFilters::default(), 25)
        .unwrap();
    let events = collect_events(handle.subscribe().await).await;

    let run = handle.result().await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.cells.len(), 4);
    assert_eq!(run.succeeded_cells(), 4);
    // Calls 0..4 return overlapping id ranges; dedup flattens them to 14
    assert_eq!(run.records.len(), 14);

    // Per-cell ordering: started strictly precedes its terminal event
    for index in 0..4 {
        let started = position(&events, |e| *e == ProgressEvent::CellStarted { index })
            .unwrap_or_else(|| panic!("cell {} never started", index));
        let completed = position(
            &events,
            |e| matches!(e, ProgressEvent::CellCompleted { index: i, .. } if *i == index),
        )
        .unwrap_or_else(|| panic!("cell {} never completed", index));
        assert!(started < completed);
    }
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::RunCompleted {
            total_records: 14,
            failed_cells: 0,
        })
    );
}

#[tokio::test]
async fn failing_cell_yields_partial_success() {
    // One of nine cells fails with a transport error after its retries are
    // exhausted; the other eight cells' records must survive
    let provider = Arc::new(ScriptedProvider::new(|n, _| {
        if n == 0 {
            Err(ProviderError::Transport {
                message: "connection reset".to_string(),
            })
        } else {
            Ok(records(n * 10..n * 10 + 5))
        }
    }));
    let orchestrator = orchestrator(Arc::clone(&provider), fast_config());

    let handle = orchestrator
        .start(alexandria(), "cafes", SearchFilters::default(), 9)
        .unwrap();
    let events = collect_events(handle.subscribe().await).await;

    let run = handle.result().await;
    assert_eq!(run.status, RunStatus::PartialSuccess);
    assert_eq!(run.cells.len(), 9);
    assert_eq!(run.failed_cells(), 1);
    assert_eq!(run.succeeded_cells(), 8);
    assert_eq!(run.records.len(), 40);

    let failed = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::CellFailed { .. }))
        .count();
    assert_eq!(failed, 1);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::RunCompleted { failed_cells: 1, .. })
    ));
}

#[tokio::test]
async fn quota_exhaustion_aborts_remaining_cells() {
    // 5 rps against 9 cells: the first window dispatches at most 5 calls,
    // the first of which burns the quota; cells still queued at the limiter
    // must be skipped without spending anything
    let provider = Arc::new(ScriptedProvider::new(|n, _| {
        if n == 0 {
            Err(ProviderError::QuotaExceeded)
        } else {
            Ok(records(n * 10..n * 10 + 10))
        }
    }));
    let config = EngineConfig {
        max_requests_per_second: 5,
        max_retries: 0,
        ..Default::default()
    };
    let orchestrator = orchestrator(Arc::clone(&provider), config);

    let handle = orchestrator
        .start(alexandria(), "pharmacies", SearchFilters::default(), 9)
        .unwrap();
    let run = handle.result().await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.cells.len(), 9);
    assert_eq!(run.failed_cells(), 1);
    assert_eq!(run.succeeded_cells() + run.skipped_cells(), 8);
    // Cells queued behind the first rate window never dispatch
    assert!(run.skipped_cells() >= 4);
    assert_eq!(provider.call_count(), run.succeeded_cells() + 1);
}

#[tokio::test]
async fn cancellation_preserves_dispatched_work() {
    let (gate, gate_rx) = Gate::new();
    let provider = Arc::new(
        ScriptedProvider::new(|n, _| Ok(records(n * 10..n * 10 + 10))).gated(gate_rx, 0),
    );
    let config = EngineConfig {
        max_requests_per_second: 5,
        max_retries: 0,
        ..Default::default()
    };
    let orchestrator = orchestrator(Arc::clone(&provider), config);

    let handle = orchestrator
        .start(alexandria(), "pharmacies", SearchFilters::default(), 9)
        .unwrap();

    // Let the first rate window dispatch exactly 5 calls, then cancel with
    // those calls still in flight
    wait_for_calls(&provider, 5).await;
    handle.cancel();
    gate.open();

    let run = handle.result().await;
    assert_eq!(run.status, RunStatus::Cancelled);
    // In-flight calls are paid for, so their results are kept
    assert_eq!(run.succeeded_cells(), 5);
    assert_eq!(run.skipped_cells(), 4);
    assert_eq!(run.failed_cells(), 0);
    assert_eq!(run.records.len(), 50);
    // Nothing dispatched after the cancellation was observed
    assert_eq!(provider.call_count(), 5);
}

#[tokio::test]
async fn cancel_releases_queued_cells_without_waiting_for_slots() {
    let (gate, gate_rx) = Gate::new();
    let provider = Arc::new(
        ScriptedProvider::new(|n, _| Ok(records(n * 10..n * 10 + 10))).gated(gate_rx, 0),
    );
    // 1 rps over 4 cells: one cell dispatches, three queue at the limiter
    let config = EngineConfig {
        max_requests_per_second: 1,
        max_retries: 0,
        ..Default::default()
    };
    let orchestrator = orchestrator(Arc::clone(&provider), config);

    let handle = orchestrator
        .start(area_km(31.2001, 29.9187, 3.5), "cafes", SearchFilters::default(), 25)
        .unwrap();
    let stream = handle.subscribe().await;
    wait_for_calls(&provider, 1).await;
    handle.cancel();
    gate.open();

    // Queued cells must stand down the moment the cancel lands, not one
    // rate-window slot at a time
    let settled = std::time::Instant::now();
    let run = handle.result().await;
    assert!(
        settled.elapsed() < std::time::Duration::from_secs(1),
        "queued cells waited out their limiter slots instead of skipping"
    );

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.succeeded_cells(), 1);
    assert_eq!(run.skipped_cells(), 3);
    assert_eq!(provider.call_count(), 1);

    // Every announced cell reached a terminal event; skipped cells are silent
    let events = collect_events(stream).await;
    let started = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::CellStarted { .. }))
        .count();
    let terminal = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                ProgressEvent::CellCompleted { .. } | ProgressEvent::CellFailed { .. }
            )
        })
        .count();
    assert_eq!(started, 1);
    assert_eq!(terminal, 1);
}

#[tokio::test]
async fn metro_grid_run_dedupes_overlapping_cells() {
    // Each call returns 60 records whose id range overlaps the previous
    // call's by 20, mimicking neighboring cells seeing the same places
    let provider = Arc::new(ScriptedProvider::new(|n, _| Ok(records(n * 40..n * 40 + 60))));
    let orchestrator = orchestrator(Arc::clone(&provider), fast_config());

    let handle = orchestrator
        .start(alexandria(), "clothing stores", SearchFilters::default(), 25)
        .unwrap();
    let run = handle.result().await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.cells.len(), 25);
    assert_eq!(provider.call_count(), 25);

    let unique: HashSet<&str> = run.records.iter().map(|r| r.place_id.as_str()).collect();
    assert_eq!(unique.len(), run.records.len());
    assert_eq!(run.records.len(), 24 * 40 + 60);

    let new_total: usize = run
        .cell_outcomes
        .iter()
        .map(|o| match o {
            CellOutcome::Succeeded { new_records } => *new_records,
            _ => 0,
        })
        .sum();
    assert_eq!(new_total, run.records.len());
}

#[tokio::test]
async fn every_subscriber_sees_the_same_tail() {
    let (gate, gate_rx) = Gate::new();
    let provider =
        Arc::new(ScriptedProvider::new(|_, _| Ok(records(0..3))).gated(gate_rx, 0));
    let orchestrator = orchestrator(Arc::clone(&provider), fast_config());

    let handle = orchestrator
        .start(area_km(31.2, 29.9, 1.5), "cafes", SearchFilters::default(), 1)
        .unwrap();
    let first = handle.subscribe().await;
    let second = handle.subscribe().await;
    gate.open();

    let first = collect_events(first).await;
    let second = collect_events(second).await;

    // The later subscriber sees a suffix of the earlier one's sequence
    assert!(second.len() <= first.len());
    assert_eq!(&first[first.len() - second.len()..], &second[..]);
    assert!(matches!(
        second.last(),
        Some(ProgressEvent::RunCompleted { failed_cells: 0, .. })
    ));
}

#[tokio::test]
async fn detached_consumer_cancels_the_run() {
    let (gate, gate_rx) = Gate::new();
    let provider = Arc::new(
        ScriptedProvider::new(|n, _| Ok(records(n * 10..n * 10 + 10))).gated(gate_rx, 0),
    );
    let config = EngineConfig {
        max_requests_per_second: 5,
        max_retries: 0,
        ..Default::default()
    };
    let orchestrator = orchestrator(Arc::clone(&provider), config);

    let handle = orchestrator
        .start(alexandria(), "pharmacies", SearchFilters::default(), 9)
        .unwrap();
    let stream = handle.subscribe().await;
    wait_for_calls(&provider, 5).await;

    // Hanging up is treated as losing interest in the run
    drop(stream);
    gate.open();

    let run = handle.result().await;
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.succeeded_cells(), 5);
    assert!(run.skipped_cells() >= 1);
}
