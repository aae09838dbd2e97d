use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::offense_level::{EngineError, TrailExportError};
use crate::workflows::rulebook::RuleBookError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    /// A caller-supplied JSON file that does not parse.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Server(axum::Error),
    RuleBook(RuleBookError),
    Engine(EngineError),
    Export(TrailExportError),
    OneBookRuleDisabled,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Json { path, source } => {
                write!(f, "invalid JSON in {}: {}", path.display(), source)
            }
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::RuleBook(err) => write!(f, "rule book error: {}", err),
            AppError::Engine(err) => write!(f, "{}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::OneBookRuleDisabled => write!(
                f,
                "year comparison is disabled (GUIDELINE_ONE_BOOK_RULE=false)"
            ),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Json { source, .. } => Some(source),
            AppError::Server(err) => Some(err),
            AppError::RuleBook(err) => Some(err),
            AppError::Engine(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::OneBookRuleDisabled => None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(EngineError::InvalidAnswer(_))
            | AppError::Engine(EngineError::Incomparable { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::RuleBook(RuleBookError::UnknownGuideline { .. }) => StatusCode::NOT_FOUND,
            AppError::OneBookRuleDisabled => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Json { .. }
            | AppError::Server(_)
            | AppError::RuleBook(_)
            | AppError::Engine(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
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

impl From<RuleBookError> for AppError {
    fn from(value: RuleBookError) -> Self {
        Self::RuleBook(value)
    }
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<TrailExportError> for AppError {
    fn from(value: TrailExportError) -> Self {
        Self::Export(value)
    }
}
