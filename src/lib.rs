//! `rpps-carteira` library crate.
//!
//! The binary (`carteira`) is a thin wrapper around this library so that:
//!
//! - the fetch/normalize/aggregate pipeline is testable without spawning processes
//! - the dashboard and the batch run share one code path

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod plot;
pub mod report;
pub mod tui;
