//! Transformation module.
//!
//! This module turns a loaded table into the run's outputs:
//! - Clean: drop incomplete rows, coerce the amount
//! - Features: log amount, optional ordering
//! - Grouper: per-dimension sales totals
//! - Pipeline: orchestration and fan-out

pub mod clean;
pub mod features;
pub mod grouper;
pub mod pipeline;

pub use clean::{clean, clean_with_stats, CleanStats};
pub use features::{add_log_feature, sort_by_amount, SortOrder};
pub use grouper::{aggregate, aggregate_all};
pub use pipeline::*;
