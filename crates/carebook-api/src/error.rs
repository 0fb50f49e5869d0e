//! API error type, the failure envelope and the JSON body extractor.

use axum::{
  Json,
  extract::{FromRequest, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use carebook_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// Login refused.
  #[error("{0}")]
  Unauthorized(String),

  /// The request body is not the JSON the action expects.
  #[error("{0}")]
  Body(#[from] JsonRejection),

  #[error("encode error: {0}")]
  Encode(#[from] serde_json::Error),
}

impl ApiError {
  /// HTTP status and the wire `kind` for this error.
  pub fn classify(&self) -> (StatusCode, &'static str) {
    match self {
      Self::Core(CoreError::Validation(_)) | Self::Body(_) => (StatusCode::BAD_REQUEST, "validation"),
      Self::Core(CoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
      Self::Core(CoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
      Self::Core(CoreError::SheetNotFound(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "structural"),
      Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
      Self::Core(CoreError::Storage(_)) | Self::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, kind) = self.classify();
    if status.is_server_error() {
      error!(error = %self, kind, "request failed");
    }
    let body = json!({ "success": false, "message": self.to_string(), "kind": kind });
    (status, Json(body)).into_response()
  }
}

/// `Json` whose rejection is reported through the failure envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct Payload<T>(pub T);
