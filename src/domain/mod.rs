//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - request input (`RawInput`) and its validated categorical pieces
//!   (`CompanyType`, `Category`, `CityTier`)
//! - the model-ready `FeatureRecord` and its ordered `FeatureVector` view
//! - prediction outputs (`PredictionResult`, `BatchSummary`)

pub mod types;

pub use types::*;
