//! Shared state for one in-flight search run
//!
//! Cell tasks mutate this state concurrently: each appends admitted records
//! through the deduplicator and writes its own cell outcome, never another
//! cell's. Progress fan-out and terminal-snapshot signalling live here so
//! the orchestrator driver stays a plain control loop.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::sync::{mpsc, watch};

use crate::core::Deduplicator;
use crate::types::{
    CandidateRecord, CellOutcome, GridCell, ProgressEvent, RunId, RunStatus, SearchArea, SearchRun,
};

/// Per-subscriber event buffer; a full buffer blocks the producing cell task
const EVENT_BUFFER: usize = 256;

/// Cooperative cancellation signal observed at suspension points
///
/// Backed by a watch channel so waiters can race pending work against the
/// signal instead of polling it between suspensions.
#[derive(Clone, Debug)]
pub struct CancelFlag {
    raised: Arc<watch::Sender<bool>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            raised: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.raised.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.raised.borrow()
    }

    /// Resolves once the flag is raised; pends forever on a flag that never is
    pub async fn cancelled(&self) {
        let mut rx = self.raised.subscribe();
        // wait_for fails only when the sender is gone, and self holds it
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, cancellable stream of [`ProgressEvent`]s for one run
///
/// Dropping the stream detaches the subscriber; once every subscriber of a
/// run has detached, the run treats the consumer as gone and cancels.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressStream {
    /// Next event, or `None` once the run has closed the stream
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Mutable bookkeeping of one run, shared between driver and cell tasks
pub struct RunState {
    pub id: RunId,
    pub query: String,
    pub area: SearchArea,
    pub cells: Vec<GridCell>,
    pub dedup: Deduplicator,
    /// Raised by either an external cancel or a quota trip; observed at
    /// suspension points to stop dispatching new provider calls
    pub abort: CancelFlag,
    cancel_requested: AtomicBool,
    quota_tripped: AtomicBool,
    status: Mutex<RunStatus>,
    outcomes: Mutex<Vec<CellOutcome>>,
    started_at: DateTime<Utc>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
    subscribers: tokio::sync::Mutex<Vec<mpsc::Sender<ProgressEvent>>>,
    had_subscriber: AtomicBool,
    final_tx: watch::Sender<Option<SearchRun>>,
}

impl RunState {
    pub fn new(query: String, area: SearchArea, cells: Vec<GridCell>) -> Arc<Self> {
        let outcomes = vec![CellOutcome::Pending; cells.len()];
        let (final_tx, _) = watch::channel(None);
        Arc::new(Self {
            id: RunId::new(),
            query,
            area,
            cells,
            dedup: Deduplicator::new(),
            abort: CancelFlag::new(),
            cancel_requested: AtomicBool::new(false),
            quota_tripped: AtomicBool::new(false),
            status: Mutex::new(RunStatus::Pending),
            outcomes: Mutex::new(outcomes),
            started_at: Utc::now(),
            finished_at: Mutex::new(None),
            subscribers: tokio::sync::Mutex::new(Vec::new()),
            had_subscriber: AtomicBool::new(false),
            final_tx,
        })
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: RunStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Request cooperative cancellation; in-flight calls finish
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.abort.cancel();
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Stop dispatching new provider calls because paid quota is exhausted
    pub fn trip_quota(&self) {
        self.quota_tripped.store(true, Ordering::SeqCst);
        self.abort.cancel();
    }

    pub fn quota_tripped(&self) -> bool {
        self.quota_tripped.load(Ordering::SeqCst)
    }

    /// True when a not-yet-started cell should be skipped instead of fetched
    pub fn should_skip_pending_work(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Record the outcome of one cell; tasks only ever write their own index
    pub fn mark_cell(&self, index: usize, outcome: CellOutcome) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes[index] = outcome;
    }

    pub fn outcome(&self, index: usize) -> CellOutcome {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner())[index].clone()
    }

    /// Admit records from one cell, returning the count of new admissions
    pub fn admit_all(&self, records: Vec<CandidateRecord>) -> usize {
        records
            .into_iter()
            .filter(|r| !r.place_id.is_empty())
            .filter(|r| self.dedup.admit(r.clone()))
            .count()
    }

    /// Attach a new subscriber; it sees events from this moment onward
    pub async fn subscribe(&self) -> ProgressStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        if self.status().is_terminal() {
            // Run already over: hand back an immediately-closed stream
            drop(tx);
            return ProgressStream { rx };
        }
        self.had_subscriber.store(true, Ordering::SeqCst);
        self.subscribers.lock().await.push(tx);
        ProgressStream { rx }
    }

    /// Deliver an event to every attached subscriber
    ///
    /// Delivery blocks on a full subscriber buffer rather than dropping the
    /// event. Subscribers that hung up are pruned; when the last one goes,
    /// the run is cancelled from the consumer's side, though work already
    /// dispatched still completes (those calls are paid for either way).
    pub async fn emit(&self, event: ProgressEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let mut alive = Vec::with_capacity(subscribers.len());
        for tx in subscribers.drain(..) {
            if tx.send(event.clone()).await.is_ok() {
                alive.push(tx);
            }
        }
        let all_gone = alive.is_empty();
        *subscribers = alive;
        drop(subscribers);

        if all_gone && self.had_subscriber.load(Ordering::SeqCst) && !self.status().is_terminal() {
            tracing::info!(run_id = %self.id, "all subscribers detached, cancelling run");
            self.request_cancel();
        }
    }

    /// Drop every subscriber sender, ending their streams
    pub async fn close_streams(&self) {
        self.subscribers.lock().await.clear();
    }

    /// Immutable view of the run as it stands right now
    pub fn snapshot(&self) -> SearchRun {
        SearchRun {
            id: self.id,
            query: self.query.clone(),
            area: self.area,
            status: self.status(),
            cells: self.cells.clone(),
            cell_outcomes: self
                .outcomes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            records: self.dedup.snapshot(),
            started_at: self.started_at,
            finished_at: *self.finished_at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Fix the terminal status and publish the final snapshot
    pub fn finalize(&self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.set_status(status);
        *self.finished_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
        // send_replace stores the value even with no receivers attached yet
        self.final_tx.send_replace(Some(self.snapshot()));
    }

    /// Wait for the run to reach a terminal state and return its snapshot
    pub async fn final_snapshot(&self) -> SearchRun {
        let mut rx = self.final_tx.subscribe();
        let guard = rx
            .wait_for(|v| v.is_some())
            .await
            .expect("final_tx lives as long as self");
        guard.clone().expect("checked is_some")
    }
}
