//! Test providers and record builders
//!
//! `ScriptedProvider` answers each call from a closure keyed by arrival
//! order, optionally parking calls behind a gate so tests can control when
//! in-flight work is allowed to finish.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

use placegrid::{CandidateRecord, Coordinate, ProviderError, ProviderQuery, SearchProvider};

type Script =
    dyn Fn(usize, &ProviderQuery) -> Result<Vec<CandidateRecord>, ProviderError> + Send + Sync;

/// Deterministic in-memory provider scripted per call-arrival index
pub struct ScriptedProvider {
    calls: AtomicUsize,
    ungated_calls: usize,
    gate: Option<watch::Receiver<bool>>,
    script: Box<Script>,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(usize, &ProviderQuery) -> Result<Vec<CandidateRecord>, ProviderError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            ungated_calls: 0,
            gate: None,
            script: Box::new(script),
        }
    }

    /// Park calls behind `gate` until it opens; the first `ungated_calls`
    /// arrivals respond immediately regardless
    pub fn gated(mut self, gate: watch::Receiver<bool>, ungated_calls: usize) -> Self {
        self.gate = Some(gate);
        self.ungated_calls = ungated_calls;
        self
    }

    /// Number of calls that reached the provider (including parked ones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<CandidateRecord>, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.ungated_calls {
            if let Some(gate) = &self.gate {
                let mut rx = gate.clone();
                let _ = rx.wait_for(|open| *open).await;
            }
        }
        (self.script)(n, query)
    }
}

/// Opens the gate that [`ScriptedProvider::gated`] providers wait on
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }
}

pub fn record(id: usize) -> CandidateRecord {
    CandidateRecord {
        place_id: format!("place-{}", id),
        name: format!("Place {}", id),
        location: Coordinate::new(31.2, 29.9),
        categories: vec!["store".to_string()],
        metadata: serde_json::Value::Null,
    }
}

pub fn records(ids: Range<usize>) -> Vec<CandidateRecord> {
    ids.map(record).collect()
}
