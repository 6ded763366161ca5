//! Input/output helpers.
//!
//! - payload normalization + decimal parsing (`ingest`)
//! - summary artifact, exports and downloads (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
