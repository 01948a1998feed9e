//! HTTP mapping for `AppError`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    detail: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Schema => StatusCode::BAD_REQUEST,
        ErrorKind::LimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::ModelUnavailable | ErrorKind::Prediction => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Io | ErrorKind::Config | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        if status.is_server_error() {
            error!(kind = self.kind().label(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind().label(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.kind().label(),
            detail: self.message(),
            field: self.field(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Schema), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::LimitExceeded), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(ErrorKind::ModelUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Prediction), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_carries_status() {
        let response = AppError::schema("bad header").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
