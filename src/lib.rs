//! wellrun -- time-boxed scraper runs with object-storage sync bracketing.
//!
//! The scraper (the "worker") and the sync tool are external programs.
//! This crate assembles their command lines, brackets worker runs with
//! skip-if-exists uploads, and keeps re-running the worker until a
//! wall-clock window closes.

pub mod clock;
pub mod config;
pub mod cycle;
pub mod error;
pub mod exec;
pub mod partition;
pub mod runner;
pub mod sync;
pub mod worker;

pub use error::{OrchestrateError, Result};
