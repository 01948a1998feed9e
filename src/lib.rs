//! `revenue-predict` library crate.
//!
//! The binary (`rp`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the HTTP server and the CLI share one prediction pipeline

pub mod app;
pub mod batch;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod io;
pub mod model;
pub mod report;
pub mod server;
