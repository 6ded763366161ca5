//! Remote data sources.

pub mod cadprev;

pub use cadprev::{CadprevClient, FetchError, Payload};
