//! Core grid search building blocks

pub mod dedup;
pub mod limiter;
pub mod planner;

pub use dedup::Deduplicator;
pub use limiter::{RateLimiter, RatePermit};
pub use planner::GridPlanner;
