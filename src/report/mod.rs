//! Reporting utilities: formatted terminal output for predictions and batches.

pub mod format;

pub use format::*;
