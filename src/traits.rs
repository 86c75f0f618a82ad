//! Trait seams with mockall annotations for testing
//!
//! The engine talks to the outside world through `SearchProvider` only.
//! Production wires in the Places client; tests inject mocks or scripted
//! providers.

use crate::error::ProviderError;
use crate::types::{CandidateRecord, ProviderQuery};

/// A places search backend
///
/// One `search` call covers one sub-region, paginating internally up to
/// `query.max_pages`. Every invocation spends paid quota, so callers must
/// hold a rate-limit permit for the duration of the call.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<CandidateRecord>, ProviderError>;
}
