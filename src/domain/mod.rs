//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the run query (`QueryParameters`) and period interpretation (`PeriodScheme`)
//! - normalized payload rows (`NormalizedRow`, `Month`, `NumericField`)
//! - aggregation outputs (`MonthlySummary`, `SegmentSummary`, `CorrelationMatrix`)

pub mod types;

pub use types::*;
