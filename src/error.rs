//! Application error type.
//!
//! One error type flows through the whole crate. The `kind` decides how the
//! error surfaces: the CLI maps it to a process exit code, the HTTP layer maps
//! it to a status code (see `server::error`).

/// Broad error categories callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A request field is missing, malformed or out of range.
    InvalidInput,
    /// A batch file does not have the shape we need (missing/duplicate columns, no rows).
    Schema,
    /// A batch exceeds the configured byte or row limit.
    LimitExceeded,
    /// The model artifact is not loaded; nothing can be predicted until restart.
    ModelUnavailable,
    /// The model was called but produced an unusable value.
    Prediction,
    Io,
    Config,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case label used in logs and JSON error bodies.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Schema => "schema_error",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::Prediction => "prediction_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Config => "config_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    field: Option<String>,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    /// Invalid input attributed to a specific request field.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LimitExceeded, message)
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModelUnavailable, message)
    }

    pub fn prediction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Prediction, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The offending field, for `InvalidInput` errors.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        match self.kind {
            ErrorKind::InvalidInput
            | ErrorKind::Schema
            | ErrorKind::LimitExceeded
            | ErrorKind::Io
            | ErrorKind::Config => 2,
            ErrorKind::ModelUnavailable => 3,
            ErrorKind::Prediction | ErrorKind::Internal => 4,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "`{field}`: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("field", &self.field)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_field() {
        let err = AppError::invalid_input("employeeCount", "must be greater than 0");
        assert_eq!(err.to_string(), "`employeeCount`: must be greater than 0");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn model_errors_use_their_own_exit_code() {
        assert_eq!(AppError::model_unavailable("no model").exit_code(), 3);
        assert_eq!(AppError::prediction("nan").exit_code(), 4);
    }
}
