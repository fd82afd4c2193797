//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Serialized as
/// `{ "error": "<message>" }` with the matching HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl From<watchman_core::Error> for ApiError {
  fn from(err: watchman_core::Error) -> Self {
    use watchman_core::Error::*;
    match err {
      UnknownEntityKind(_) | UnknownSourceList(_)
      | UnknownGovernmentIdType(_) | InvalidQuery(_)
      | InvalidDate { .. } => ApiError::BadRequest(err.to_string()),
      KindMismatch { .. } | Cancelled | Serialization(_) => {
        ApiError::Internal(err.to_string())
      }
    }
  }
}

impl From<watchman_sources::Error> for ApiError {
  fn from(err: watchman_sources::Error) -> Self {
    use watchman_sources::Error::*;
    match err {
      UnknownFileType(_) | MalformedFile { .. } => {
        ApiError::BadRequest(err.to_string())
      }
      Core(core) => core.into(),
      other => ApiError::Internal(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(m) => {
        tracing::error!(error = %m, "internal API error");
        (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
