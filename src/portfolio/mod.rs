//! Portfolio-level scoring and queries.
//!
//! - `metrics`: row-wise carry, liquidity and tradeability
//! - `analyzer`: fitted snapshot plus candidate queries
//! - `summary`: portfolio and sector aggregates

pub mod analyzer;
pub mod metrics;
pub mod summary;

pub use analyzer::*;
pub use metrics::*;
pub use summary::*;
