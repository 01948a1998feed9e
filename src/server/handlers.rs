//! Route handlers.
//!
//! Handlers stay thin: decode the request, call `app::pipeline`, encode the
//! result. CPU-bound batch work runs on the blocking pool.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::app::pipeline::{BatchOptions, BatchOutput, predict_batch, predict_one};
use crate::batch::RowError;
use crate::domain::{BatchSummary, PredictionResult, RawInput};
use crate::error::AppError;
use crate::io::{TableFormat, read_table_bytes};
use crate::model::ModelStatus;
use crate::server::AppState;

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "revenue-predict",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "predict": "POST /api/predict",
            "bulk": "POST /api/predict/bulk",
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model: ModelStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let loaded = state.engine.is_loaded();
    Json(HealthResponse {
        status: if loaded { "healthy" } else { "degraded" },
        model_loaded: loaded,
        model: state.engine.status().clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResult>, AppError> {
    let Json(body) = payload.map_err(json_rejection)?;
    let raw = decode_raw_input(body)?;
    let result = predict_one(&state.engine, &raw)?;
    info!(
        predicted_revenue = result.predicted_revenue,
        company_type = %result.input.company_type,
        "single prediction"
    );
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub predictions: Vec<Value>,
    pub statistics: BatchSummary,
    pub rejected: Vec<RowError>,
    pub rows_read: usize,
}

impl From<BatchOutput> for BulkResponse {
    fn from(output: BatchOutput) -> Self {
        Self {
            predictions: output.predictions.iter().map(|p| p.to_row_object()).collect(),
            statistics: output.statistics,
            rejected: output.rejected,
            rows_read: output.rows_read,
        }
    }
}

pub async fn predict_bulk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BulkResponse>, AppError> {
    state.engine.ensure_loaded()?;

    let (file_name, data) = read_file_field(&mut multipart).await?;
    let format = TableFormat::from_file_name(&file_name).ok_or_else(|| {
        AppError::invalid_input(
            "file",
            format!("Unsupported file '{file_name}'; upload a .csv, .xlsx or .xls file."),
        )
    })?;
    info!(file = %file_name, bytes = data.len(), ?format, "bulk upload received");

    let engine = state.engine.clone();
    let limits = state.limits;
    let output = tokio::task::spawn_blocking(move || {
        let table = read_table_bytes(&data, format, &limits)?;
        predict_batch(&engine, table, BatchOptions::default())
    })
    .await
    .map_err(|e| AppError::internal(format!("Batch task failed: {e}")))??;

    Ok(Json(output.into()))
}

/// Pull the `file` part out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok((file_name, data));
    }
    Err(AppError::invalid_input("file", "Multipart field 'file' is required."))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::limit_exceeded(format!("Upload too large: {}", err.body_text()))
    } else {
        AppError::invalid_input("file", format!("Malformed multipart body: {}", err.body_text()))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::invalid_input("body", rejection.body_text())
}

const REQUIRED_FIELDS: [&str; 4] = ["employeeCount", "companyAge", "companyType", "state"];

/// Decode a prediction request, naming the offending field on failure.
fn decode_raw_input(body: Value) -> Result<RawInput, AppError> {
    let Some(object) = body.as_object() else {
        return Err(AppError::invalid_input("body", "Request body must be a JSON object."));
    };
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|name| object.get(**name).is_none_or(Value::is_null))
    {
        return Err(AppError::invalid_input(*missing, "field required"));
    }

    serde_path_to_error::deserialize(body).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." { "body".to_string() } else { path };
        AppError::invalid_input(field, err.into_inner().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn valid() -> Value {
        json!({
            "employeeCount": 12,
            "companyAge": 3,
            "companyType": "LLP",
            "state": "Goa",
        })
    }

    #[test]
    fn decodes_a_complete_request() {
        let raw = decode_raw_input(valid()).unwrap();
        assert_eq!(raw.employee_count, 12.0);
        assert_eq!(raw.city, None);
    }

    #[test]
    fn missing_fields_are_named() {
        for name in REQUIRED_FIELDS {
            let mut body = valid();
            body.as_object_mut().unwrap().remove(name);
            let err = decode_raw_input(body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert_eq!(err.field(), Some(name));
        }
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        let mut body = valid();
        body["state"] = Value::Null;
        assert_eq!(decode_raw_input(body).unwrap_err().field(), Some("state"));
    }

    #[test]
    fn mistyped_fields_are_named() {
        let mut body = valid();
        body["companyAge"] = json!("old");
        let err = decode_raw_input(body).unwrap_err();
        assert_eq!(err.field(), Some("companyAge"));

        let mut body = valid();
        body["city"] = json!(42);
        assert_eq!(decode_raw_input(body).unwrap_err().field(), Some("city"));
    }

    #[test]
    fn non_objects_are_body_errors() {
        let err = decode_raw_input(json!([1, 2])).unwrap_err();
        assert_eq!(err.field(), Some("body"));
    }
}
