//! HTTP error mapping. Every error body is `{"detail": "..."}`.

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use simpl_core::{DatasetError, EvalError, ReportError};
use simpl_state::StorageError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Well-formed request with an unacceptable payload.
    #[error("{0}")]
    Unprocessable(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ScorerNotFound { .. } => Self::NotFound("Scorer not found".into()),
            StorageError::ProfileNotFound { .. } => Self::NotFound("Profile not found".into()),
            StorageError::RunNotFound { .. } => Self::NotFound("Run not found".into()),
            other => Self::internal(other),
        }
    }
}

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::ProfileNotFound(_) => Self::NotFound("Profile not found".into()),
            EvalError::RunNotFound(_) => Self::NotFound("Run not found".into()),
            EvalError::DatasetNotFound(_) => Self::NotFound("Dataset not found".into()),
            EvalError::Storage(err) => err.into(),
            EvalError::Dataset(err) => err.into(),
            EvalError::Report(err) => err.into(),
            EvalError::Scorer(err) => Self::Unprocessable(err.to_string()),
            other => Self::internal(other),
        }
    }
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Io(io) => Self::internal(io),
            other => Self::BadRequest(format!("Invalid CSV file: {other}")),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidPagination => Self::Unprocessable(err.to_string()),
            ReportError::Unreadable { .. } => Self::Internal(format!("Failed to load report: {err}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let mut response = (status, Json(json!({ "detail": self.to_string() }))).into_response();
        if let Self::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
