//! Trained-model adapter.
//!
//! - `artifact`: on-disk JSON schema of the trained tree ensemble
//! - `ensemble`: feature encoding + tree traversal (`TreeEnsemble`)
//! - `engine`: load-once wrapper with health status and the inverse-log transform
//!
//! The pipeline only talks to the [`Regressor`] trait, so tests can swap in a
//! deterministic stub without a trained artifact.

pub mod artifact;
pub mod engine;
pub mod ensemble;

pub use artifact::*;
pub use engine::*;
pub use ensemble::*;

use crate::domain::FeatureVector;
use crate::error::AppError;

/// A trained regression model.
///
/// Implementations must be pure: the same vector always yields the same value.
pub trait Regressor: Send + Sync {
    /// Raw model output on the training-target scale (`log1p` of revenue).
    fn predict_log(&self, features: &FeatureVector) -> Result<f64, AppError>;

    /// Short human-readable description for health output.
    fn describe(&self) -> String {
        "regressor".to_string()
    }
}
