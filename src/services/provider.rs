//! Rate-limited, retrying wrapper around a search provider
//!
//! Every outbound attempt spends paid quota, so each one claims its own
//! rate-limit slot and the retry policy lives here rather than in the
//! orchestrator: transport failures and provider throttling are retried
//! with exponential backoff, quota exhaustion and malformed data are not.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::core::{RateLimiter, RatePermit};
use crate::error::ProviderError;
use crate::state::CancelFlag;
use crate::traits::SearchProvider;
use crate::types::{CandidateRecord, GridCell, ProviderQuery, SearchFilters};

/// Field projection requested from the provider
///
/// Billing is per field on the Places API, so this mask names only what the
/// engine consumes downstream; widening it changes cost, not behavior.
pub const TEXT_SEARCH_FIELD_MASK: &str = "places.id,places.displayName,places.location,\
     places.types,places.formattedAddress,places.rating,places.userRatingCount,\
     places.businessStatus,nextPageToken";

/// Backoff floor and ceiling for retryable failures
const BACKOFF_MIN: Duration = Duration::from_secs(2);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Issues one sub-region search with retry, backoff, and timeout applied
pub struct ProviderClient {
    provider: Arc<dyn SearchProvider>,
    limiter: Arc<RateLimiter>,
    call_timeout: Duration,
    max_retries: u32,
}

impl ProviderClient {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        limiter: Arc<RateLimiter>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            provider,
            limiter,
            call_timeout: config.call_timeout,
            max_retries: config.max_retries,
        }
    }

    /// Claim a rate-limit slot for a cell's first dispatch
    ///
    /// The wait races the abort signal, so cells queued at the limiter stand
    /// down the moment the run is cancelled or its quota trips instead of
    /// waiting out a window slot. Returns `None` when the abort wins; no
    /// slot is consumed in that case.
    pub async fn acquire_slot(&self, abort: &CancelFlag) -> Option<RatePermit> {
        tokio::select! {
            permit = self.limiter.acquire() => {
                if abort.is_cancelled() {
                    return None;
                }
                Some(permit)
            }
            _ = abort.cancelled() => None,
        }
    }

    /// Fetch candidates for one grid cell using an already-claimed slot
    ///
    /// Each attempt runs under the per-call timeout; an elapsed timeout
    /// counts as a transport failure. Retries claim a fresh slot per
    /// attempt, still racing the abort signal; an abort observed between
    /// attempts returns the last failure rather than spending another call.
    pub async fn fetch(
        &self,
        mut permit: RatePermit,
        cell: &GridCell,
        query: &str,
        filters: &SearchFilters,
        abort: &CancelFlag,
    ) -> Result<Vec<CandidateRecord>, ProviderError> {
        let request = ProviderQuery {
            query: query.to_string(),
            center: cell.center,
            radius_m: cell.radius_m,
            field_mask: TEXT_SEARCH_FIELD_MASK,
            max_pages: filters.max_pages,
        };

        let mut attempt = 0u32;
        loop {
            let outcome = {
                let _slot = permit;
                tokio::time::timeout(self.call_timeout, self.provider.search(&request)).await
            };

            let error = match outcome {
                Ok(Ok(records)) => {
                    tracing::debug!(
                        cell = cell.index,
                        records = records.len(),
                        "provider call succeeded"
                    );
                    return Ok(records);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Transport {
                    message: format!("call timed out after {:?}", self.call_timeout),
                },
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                return Err(error);
            }
            attempt += 1;
            let delay = backoff_delay(attempt);
            tracing::warn!(
                cell = cell.index,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "provider call failed, backing off"
            );
            tokio::time::sleep(delay).await;

            permit = tokio::select! {
                next = self.limiter.acquire() => next,
                _ = abort.cancelled() => return Err(error),
            };
            if abort.is_cancelled() {
                // Don't spend another paid call on a run nobody wants
                return Err(error);
            }
        }
    }
}

/// Exponential backoff: 2s, 4s, 8s, ... capped at 30s
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_MIN.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    exp.min(BACKOFF_MAX)
}
