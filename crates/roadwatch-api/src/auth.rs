//! Caller authentication against the external identity service.

use std::{future::Future, time::Duration};

use axum::{
  extract::FromRequestParts,
  http::{StatusCode, header, request::Parts},
};
use roadwatch_core::{clock::Clock, store::IncidentStore, user::User};
use thiserror::Error;

use crate::{AppState, error::ApiError};

/// Why a caller could not be identified. Each case maps to its own status.
#[derive(Debug, Error)]
pub enum AuthError {
  #[error("authorization header is missing")]
  MissingHeader,
  #[error("invalid token")]
  InvalidToken,
  #[error("session is expired")]
  SessionExpired,
  #[error("invalid user")]
  InvalidUser,
  #[error("identity service unavailable: {0}")]
  Unavailable(String),
}

impl AuthError {
  pub fn status(&self) -> StatusCode {
    match self {
      AuthError::MissingHeader | AuthError::InvalidToken | AuthError::InvalidUser => {
        StatusCode::UNAUTHORIZED
      }
      AuthError::SessionExpired => StatusCode::FORBIDDEN,
      AuthError::Unavailable(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

/// Maps an opaque `Authorization` header value to a user.
pub trait IdentityResolver: Send + Sync + 'static {
  fn resolve(
    &self,
    authorization: &str,
  ) -> impl Future<Output = Result<User, AuthError>> + Send;
}

// ─── HTTP resolver ───────────────────────────────────────────────────────────

/// Calls `GET {base_url}/internal/users/check-auth` with the caller's header.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
  client:   reqwest::Client,
  base_url: String,
}

impl HttpIdentityResolver {
  pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self) -> String {
    format!("{}/internal/users/check-auth", self.base_url.trim_end_matches('/'))
  }
}

impl IdentityResolver for HttpIdentityResolver {
  async fn resolve(&self, authorization: &str) -> Result<User, AuthError> {
    let resp = self
      .client
      .get(self.url())
      .header(reqwest::header::AUTHORIZATION, authorization)
      .send()
      .await
      .map_err(|e| {
        tracing::error!(error = %e, "identity service request failed");
        AuthError::Unavailable(e.to_string())
      })?;

    match resp.status() {
      reqwest::StatusCode::OK => resp.json::<User>().await.map_err(|e| {
        tracing::error!(error = %e, "identity service returned a malformed user");
        AuthError::Unavailable(e.to_string())
      }),
      reqwest::StatusCode::UNAUTHORIZED => Err(AuthError::InvalidToken),
      reqwest::StatusCode::FORBIDDEN => Err(AuthError::SessionExpired),
      other => {
        tracing::debug!(status = %other, "identity service rejected user");
        Err(AuthError::InvalidUser)
      }
    }
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The authenticated caller. Handlers taking this reject unauthenticated
/// requests before running.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S, C, R> FromRequestParts<AppState<S, C, R>> for CurrentUser
where
  S: IncidentStore + 'static,
  C: Clock,
  R: IdentityResolver,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C, R>,
  ) -> Result<Self, Self::Rejection> {
    let authorization = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .filter(|v| !v.trim().is_empty())
      .ok_or(AuthError::MissingHeader)?;

    let user = state.identity.resolve(authorization).await?;
    Ok(CurrentUser(user))
  }
}
