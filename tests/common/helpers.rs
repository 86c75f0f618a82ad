//! Builders and polling helpers shared by the integration suites

use std::sync::Arc;
use std::time::Duration;

use placegrid::{
    Coordinate, EngineConfig, ProgressEvent, ProgressStream, SearchArea, SearchOrchestrator,
    SearchProvider,
};

use super::fixtures::ScriptedProvider;

/// Config with the rate limiter effectively out of the way
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        max_requests_per_second: 1_000,
        max_retries: 0,
        ..Default::default()
    }
}

pub fn orchestrator(provider: Arc<ScriptedProvider>, config: EngineConfig) -> SearchOrchestrator {
    let provider: Arc<dyn SearchProvider> = provider;
    SearchOrchestrator::new(provider, config).unwrap()
}

pub fn area_km(latitude: f64, longitude: f64, radius_km: f64) -> SearchArea {
    SearchArea::new(Coordinate::new(latitude, longitude), radius_km * 1_000.0)
}

/// The 20km metro-area fixture used by the end-to-end tests
pub fn alexandria() -> SearchArea {
    area_km(31.2001, 29.9187, 20.0)
}

/// Drain a progress stream until the run closes it
pub async fn collect_events(mut stream: ProgressStream) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }
    events
}

/// Poll until `n` calls have reached the provider (parked calls count)
pub async fn wait_for_calls(provider: &ScriptedProvider, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while provider.call_count() < n {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} provider calls, saw {}",
            n,
            provider.call_count()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
