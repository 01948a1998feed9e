//! Export batch results.
//!
//! - predictions CSV: the uploaded columns plus `predicted_revenue`, easy to
//!   reopen in a spreadsheet
//! - report JSON: run metadata, statistics and the rejected rows

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::batch::{BatchPrediction, RowError};
use crate::domain::BatchSummary;
use crate::error::AppError;

/// Machine-readable summary of one batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub rows_read: usize,
    pub rows_predicted: usize,
    pub statistics: &'a BatchSummary,
    pub rejected: &'a [RowError],
}

/// Write predicted rows to CSV, preserving input column order.
///
/// `headers` are the batch's echo names, as returned by `BatchJob::headers`.
pub fn write_predictions_csv(
    path: &Path,
    headers: &[String],
    predictions: &[BatchPrediction],
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::io(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;

    let header_row = headers.iter().map(String::as_str).chain(["predicted_revenue"]);
    writer
        .write_record(header_row)
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for prediction in predictions {
        let mut record: Vec<String> = headers
            .iter()
            .map(|h| prediction.cells.get(h).map(cell_text).unwrap_or_default())
            .collect();
        record.push(prediction.result.predicted_revenue.to_string());
        writer
            .write_record(&record)
            .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write the batch report as pretty JSON.
pub fn write_batch_report_json(path: &Path, report: &BatchReport<'_>) -> Result<(), AppError> {
    let file = std::fs::File::create(path).map_err(|e| {
        AppError::io(format!("Failed to create report JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::io(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::summarize;
    use crate::domain::{PredictionResult, RawInput};
    use serde_json::{Map, json};

    fn prediction() -> BatchPrediction {
        let mut cells = Map::new();
        cells.insert("Employee Count".to_string(), json!(120));
        cells.insert("city".to_string(), json!("Pune"));
        cells.insert("notes".to_string(), Value::Null);
        BatchPrediction {
            row: 0,
            line: 2,
            cells,
            result: PredictionResult {
                predicted_revenue: 1234.5,
                input: RawInput {
                    employee_count: 120.0,
                    company_age: 3.0,
                    company_type: "LLP".to_string(),
                    category: None,
                    city: Some("Pune".to_string()),
                    state: String::new(),
                    revenue: None,
                },
            },
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rp-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn predictions_csv_keeps_columns_and_appends_prediction() {
        let path = temp_path("predictions.csv");
        let headers = vec!["Employee Count".to_string(), "city".to_string(), "notes".to_string()];
        write_predictions_csv(&path, &headers, &[prediction()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Employee Count,city,notes,predicted_revenue"));
        assert_eq!(lines.next(), Some("120,Pune,,1234.5"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn report_json_has_metadata_and_rejections() {
        let path = temp_path("report.json");
        let statistics = summarize(&[1234.5]);
        let rejected = vec![RowError {
            row: 1,
            line: 3,
            field: Some("employeeCount".to_string()),
            message: "must be a finite number greater than 0 (got -5)".to_string(),
        }];
        let report = BatchReport {
            tool: "rp",
            generated_at: Utc::now(),
            source: "companies.csv".to_string(),
            rows_read: 2,
            rows_predicted: 1,
            statistics: &statistics,
            rejected: &rejected,
        };
        write_batch_report_json(&path, &report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["tool"], "rp");
        assert_eq!(json["rows_read"], 2);
        assert_eq!(json["statistics"]["count"], 1);
        assert_eq!(json["rejected"][0]["line"], 3);
        assert_eq!(json["rejected"][0]["field"], "employeeCount");
    }
}
