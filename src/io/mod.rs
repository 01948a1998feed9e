//! Input/output helpers.
//!
//! - CSV ingest with size limits (`ingest`)
//! - prediction CSV and report JSON exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
