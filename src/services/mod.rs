//! Provider integrations and the retrying call wrapper

pub mod places;
pub mod provider;

pub use places::GooglePlacesProvider;
pub use provider::{ProviderClient, TEXT_SEARCH_FIELD_MASK};
