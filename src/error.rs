use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

/// Domain failures of the report and admin operations.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required field is missing, blank, or too long.
    #[error("{0}")]
    Validation(String),
    #[error("report not found")]
    NotFound,
    /// Every generated access code collided with an existing one.
    #[error("could not allocate a unique access code")]
    Conflict,
    #[error("invalid credentials")]
    Unauthorized,
    /// Any other persistence failure. Only `context` is shown to the caller.
    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ReportError {
    /// Translate a store failure, labelling unexpected ones with `context`.
    pub fn from_store(context: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Conflict => Self::Conflict,
            err @ StoreError::Database(_) => Self::Store {
                context,
                source: err,
            },
        }
    }

    /// The HTTP status this failure is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `axum`-compatible error handler.
///
/// The response body is `{"error": <message>}` where the message is the outermost
/// description of `err`. The full chain is only written to the log.
#[derive(Error)]
pub struct Error {
    status: StatusCode,
    err: anyhow::Error,
}

impl Error {
    pub fn with_status(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            err: err.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ReportError::Validation(msg.into()).into()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl From<ReportError> for Error {
    fn from(err: ReportError) -> Self {
        Self::with_status(err.status(), err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.err)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.err.fmt(f)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{:?}", self.err);
        } else {
            warn!("{}: {}", self.status, self.err);
        }

        // N.B: `Display` on `anyhow::Error` only prints the outermost message, so
        // database details never reach the requester.
        (self.status, Json(json!({ "error": self.err.to_string() }))).into_response()
    }
}
