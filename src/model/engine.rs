//! Prediction engine: the load-once, read-only model handle.
//!
//! The engine owns an optional [`Regressor`]. When the artifact could not be
//! loaded the engine still exists (so health checks can report why) but every
//! prediction fails with `ModelUnavailable`.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::FeatureRecord;
use crate::error::AppError;
use crate::model::Regressor;
use crate::model::artifact::ModelArtifact;
use crate::model::ensemble::TreeEnsemble;

/// Whether a model is available, and where it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModelStatus {
    Loaded {
        source: String,
        description: String,
        loaded_at: DateTime<Utc>,
    },
    Missing {
        source: String,
        reason: String,
    },
}

pub struct PredictionEngine {
    regressor: Option<Arc<dyn Regressor>>,
    status: ModelStatus,
}

impl PredictionEngine {
    /// Load a tree-ensemble artifact, failing if it is missing or invalid.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let artifact = ModelArtifact::load_json(path)?;
        let ensemble = TreeEnsemble::from_artifact(&artifact).map_err(|e| {
            AppError::model_unavailable(format!(
                "Invalid model artifact '{}': {}",
                path.display(),
                e.message()
            ))
        })?;
        info!(
            path = %path.display(),
            trees = ensemble.num_trees(),
            columns = ensemble.width(),
            "model artifact loaded"
        );
        Ok(Self::with_regressor(Arc::new(ensemble), path.display().to_string()))
    }

    /// Like [`PredictionEngine::load`], but keeps running without a model.
    pub fn load_or_degraded(path: &Path) -> Self {
        match Self::load(path) {
            Ok(engine) => engine,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "starting without a model");
                Self::unavailable(path.display().to_string(), err.message())
            }
        }
    }

    pub fn with_regressor(regressor: Arc<dyn Regressor>, source: impl Into<String>) -> Self {
        let status = ModelStatus::Loaded {
            source: source.into(),
            description: regressor.describe(),
            loaded_at: Utc::now(),
        };
        Self {
            regressor: Some(regressor),
            status,
        }
    }

    pub fn unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            regressor: None,
            status: ModelStatus::Missing {
                source: source.into(),
                reason: reason.into(),
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.regressor.is_some()
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    /// Fail with `ModelUnavailable` unless a model is loaded.
    pub fn ensure_loaded(&self) -> Result<(), AppError> {
        if self.is_loaded() { Ok(()) } else { Err(self.not_loaded()) }
    }

    fn not_loaded(&self) -> AppError {
        match &self.status {
            ModelStatus::Missing { reason, .. } => {
                AppError::model_unavailable(format!("Model not loaded: {reason}"))
            }
            ModelStatus::Loaded { .. } => AppError::model_unavailable("Model not loaded."),
        }
    }

    /// Predict revenue for one record, on the original currency scale.
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, AppError> {
        let Some(regressor) = &self.regressor else {
            return Err(self.not_loaded());
        };
        let raw = regressor.predict_log(&record.to_vector())?;
        inverse_log(raw)
    }
}

/// Undo the `log1p` target transform.
///
/// Negative results are clamped to zero; revenue cannot be negative.
pub fn inverse_log(raw: f64) -> Result<f64, AppError> {
    if !raw.is_finite() {
        return Err(AppError::prediction(format!("Model returned a non-finite value ({raw}).")));
    }
    let revenue = raw.exp_m1();
    if !revenue.is_finite() {
        return Err(AppError::prediction(format!(
            "Model output {raw} overflows when converted back to revenue."
        )));
    }
    Ok(if revenue > 0.0 { revenue } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, CityTier, CompanyType, FeatureValue, FeatureVector};
    use crate::error::ErrorKind;

    /// Returns `ln(1 + employees)` so the engine should recover the headcount.
    struct HeadcountStub;

    impl Regressor for HeadcountStub {
        fn predict_log(&self, features: &FeatureVector) -> Result<f64, AppError> {
            match features.get("employeeCount") {
                Some(FeatureValue::Numeric(v)) => Ok(v.ln_1p()),
                _ => Err(AppError::internal("no employeeCount")),
            }
        }
    }

    struct ConstStub(f64);

    impl Regressor for ConstStub {
        fn predict_log(&self, _: &FeatureVector) -> Result<f64, AppError> {
            Ok(self.0)
        }
    }

    fn record() -> FeatureRecord {
        FeatureRecord {
            employee_count: 250.0,
            company_age: 12.0,
            revenue_per_employee: 1.0,
            tenure_index: 0.048,
            company_type: CompanyType::PrivateCompany,
            category: Category::Missing,
            city: None,
            city_tier: CityTier::Tier2And3,
            state: String::new(),
            revenue: None,
        }
    }

    #[test]
    fn applies_expm1_to_model_output() {
        let engine = PredictionEngine::with_regressor(Arc::new(HeadcountStub), "stub");
        let revenue = engine.predict(&record()).unwrap();
        assert!((revenue - 250.0).abs() < 1e-9);
        assert_eq!(engine.predict(&record()).unwrap(), revenue);
    }

    #[test]
    fn clamps_negative_revenue_to_zero() {
        let engine = PredictionEngine::with_regressor(Arc::new(ConstStub(-0.5)), "stub");
        assert_eq!(engine.predict(&record()).unwrap(), 0.0);
    }

    #[test]
    fn non_finite_output_is_a_prediction_error() {
        for raw in [f64::NAN, f64::INFINITY, 1e6] {
            let engine = PredictionEngine::with_regressor(Arc::new(ConstStub(raw)), "stub");
            assert_eq!(engine.predict(&record()).unwrap_err().kind(), ErrorKind::Prediction);
        }
    }

    #[test]
    fn unavailable_engine_refuses_to_predict() {
        let engine = PredictionEngine::unavailable("model.json", "file not found");
        assert!(!engine.is_loaded());
        let err = engine.predict(&record()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
        assert!(matches!(engine.status(), ModelStatus::Missing { .. }));
    }

    #[test]
    fn load_or_degraded_reports_missing_artifact() {
        let engine = PredictionEngine::load_or_degraded(Path::new("no/such/model.json"));
        match engine.status() {
            ModelStatus::Missing { source, reason } => {
                assert_eq!(source, "no/such/model.json");
                assert!(reason.contains("Failed to open"));
            }
            ModelStatus::Loaded { .. } => panic!("expected missing model"),
        }
    }
}
