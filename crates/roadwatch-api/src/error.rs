//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use roadwatch_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Malformed query, path or body.
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Engine(#[from] roadwatch_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Auth(e) => e.status(),
      ApiError::Engine(e) => match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Locked => StatusCode::LOCKED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      match &self {
        ApiError::Auth(e) => e.to_string(),
        _ => "internal server error".to_owned(),
      }
    } else {
      self.to_string()
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
