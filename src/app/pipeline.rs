//! Shared prediction pipeline used by both the CLI and the HTTP server.
//!
//! Keeping this in one place means both front ends run exactly the same flow:
//! raw input -> validation/derivation -> model -> expm1
//! and, for batches:
//! table -> column resolution -> rows -> exclusion of bad rows -> statistics
//!
//! Front ends only deal with presentation (terminal text vs JSON).

use std::path::Path;

use tracing::{info, warn};

use crate::batch::{BatchJob, BatchPrediction, RowError, RowOutcome, summarize};
use crate::domain::{BatchSummary, PredictionResult, RawInput};
use crate::error::AppError;
use crate::features::derive;
use crate::io::{BatchLimits, TabularInput, read_table_path};
use crate::model::PredictionEngine;

/// Options for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Fan rows out over the rayon pool.
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// All computed outputs of a single batch run.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub headers: Vec<String>,
    pub rows_read: usize,
    pub predictions: Vec<BatchPrediction>,
    pub rejected: Vec<RowError>,
    pub statistics: BatchSummary,
}

/// Validate, derive and predict one company.
pub fn predict_one(engine: &PredictionEngine, raw: &RawInput) -> Result<PredictionResult, AppError> {
    let record = derive(raw)?;
    let predicted_revenue = engine.predict(&record)?;
    Ok(PredictionResult {
        predicted_revenue,
        input: raw.normalized(),
    })
}

/// Run every row of `table` through the model.
pub fn predict_batch(
    engine: &PredictionEngine,
    table: TabularInput,
    options: BatchOptions,
) -> Result<BatchOutput, AppError> {
    // A missing model fails the request before any row work.
    engine.ensure_loaded()?;

    let job = BatchJob::new(table)?;
    let headers = job.headers().to_vec();
    let rows_read = job.row_count();

    let outcomes = if options.parallel {
        job.run_parallel(engine)?
    } else {
        job.rows(engine).collect::<Result<Vec<_>, _>>()?
    };

    let mut predictions = Vec::with_capacity(outcomes.len());
    let mut rejected = Vec::new();
    for outcome in outcomes {
        match outcome {
            RowOutcome::Predicted(p) => predictions.push(p),
            RowOutcome::Rejected(err) => rejected.push(err),
        }
    }

    let values: Vec<f64> = predictions.iter().map(|p| p.result.predicted_revenue).collect();
    let statistics = summarize(&values);

    if !rejected.is_empty() {
        warn!(
            rejected = rejected.len(),
            first_line = rejected[0].line,
            first_error = %rejected[0].message,
            "batch rows excluded"
        );
    }
    info!(rows_read, predicted = predictions.len(), "batch complete");

    Ok(BatchOutput {
        headers,
        rows_read,
        predictions,
        rejected,
        statistics,
    })
}

/// Read a CSV or spreadsheet from disk and run it as a batch.
pub fn predict_batch_file(
    engine: &PredictionEngine,
    path: &Path,
    limits: &BatchLimits,
    options: BatchOptions,
) -> Result<BatchOutput, AppError> {
    let table = read_table_path(path, limits)?;
    predict_batch(engine, table, options)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{FeatureValue, FeatureVector};
    use crate::error::ErrorKind;
    use crate::io::{TableFormat, read_table_bytes};
    use crate::model::Regressor;

    struct Headcount;

    impl Regressor for Headcount {
        fn predict_log(&self, features: &FeatureVector) -> Result<f64, AppError> {
            match features.get("employeeCount") {
                Some(FeatureValue::Numeric(v)) => Ok(v.ln_1p()),
                _ => Err(AppError::internal("no employeeCount")),
            }
        }
    }

    fn engine() -> PredictionEngine {
        PredictionEngine::with_regressor(Arc::new(Headcount), "test")
    }

    fn raw() -> RawInput {
        RawInput {
            employee_count: 250.0,
            company_age: 12.0,
            company_type: "private company".to_string(),
            category: Some("Managed Services".to_string()),
            city: Some("Bengaluru".to_string()),
            state: "Karnataka".to_string(),
            revenue: None,
        }
    }

    fn table(csv: &str) -> TabularInput {
        read_table_bytes(csv.as_bytes(), TableFormat::Csv, &BatchLimits::default()).unwrap()
    }

    #[test]
    fn predict_one_returns_normalized_input() {
        let result = predict_one(&engine(), &raw()).unwrap();
        assert!((result.predicted_revenue - 250.0).abs() < 1e-9);
        assert_eq!(result.input.company_type, "Private Company");
    }

    #[test]
    fn predict_one_surfaces_invalid_input() {
        let mut raw = raw();
        raw.employee_count = 0.0;
        let err = predict_one(&engine(), &raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn statistics_cover_successful_rows_only() {
        let csv = "employeeCount,companyAge\n100,1\n-5,1\n300,2\n";
        let output = predict_batch(&engine(), table(csv), BatchOptions::default()).unwrap();
        assert_eq!(output.rows_read, 3);
        assert_eq!(output.predictions.len(), 2);
        assert_eq!(output.rejected.len(), 1);
        assert_eq!(output.rejected[0].row, 1);
        assert_eq!(output.statistics.count, 2);
        let mean = output.statistics.mean.unwrap();
        assert!((mean - 200.0).abs() < 1e-6);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let csv = "employeeCount,companyAge,city\n10,1,Pune\n20,2,\nx,3,Delhi\n40,4,Noida\n";
        let seq = predict_batch(&engine(), table(csv), BatchOptions { parallel: false }).unwrap();
        let par = predict_batch(&engine(), table(csv), BatchOptions { parallel: true }).unwrap();
        assert_eq!(seq.predictions, par.predictions);
        assert_eq!(seq.rejected, par.rejected);
        assert_eq!(seq.statistics, par.statistics);
    }

    #[test]
    fn missing_model_fails_before_rows() {
        let engine = PredictionEngine::unavailable("model.json", "not found");
        let err = predict_batch(&engine, table("employeeCount,companyAge\n1,1\n"), BatchOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let err = predict_batch(&engine(), table("city\nPune\n"), BatchOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
