//! Analysis modules.
//!
//! Aggregation over a normalized report and the proceed decision built on
//! top of it.

pub mod aggregator;
pub mod decision;

pub use aggregator::*;
pub use decision::{recommend, Decision, Recommendation};
