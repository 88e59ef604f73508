use crate::applications::{FilterError, RepositoryError};
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::program::ProgramError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Program(ProgramError),
    Export(ExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Program(err) => write!(f, "program error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Program(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Program(ProgramError::ProgramNotFound(_))
            | AppError::Program(ProgramError::BlockNotFound { .. })
            | AppError::Export(ExportError::ApplicationNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Export(ExportError::Repository(RepositoryError::NotFound)) => {
                StatusCode::NOT_FOUND
            }
            // Recoverable edit failures carry the joined message so the
            // caller can show it as a flash message.
            AppError::Program(ProgramError::IllegalPredicateOrdering(_))
            | AppError::Program(ProgramError::Validation(_))
            | AppError::Program(ProgramError::ProgramNeedsABlock(_))
            | AppError::Program(ProgramError::ProgramNotDraft(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Export(ExportError::Filter(FilterError::InvalidDate { .. }))
            | AppError::Export(ExportError::UnsupportedFormat(_)) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ProgramError> for AppError {
    fn from(value: ProgramError) -> Self {
        Self::Program(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<FilterError> for AppError {
    fn from(value: FilterError) -> Self {
        Self::Export(ExportError::Filter(value))
    }
}
