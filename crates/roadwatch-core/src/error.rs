//! Error types for `roadwatch-core`.
//!
//! Every engine operation fails with an [`Error`] whose [`ErrorKind`] is the
//! status signal a transport maps onto its own status codes.

use thiserror::Error;

/// The status signal carried by every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  BadRequest,
  RateLimited,
  Forbidden,
  Locked,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  RateLimited(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  Locked(String),

  /// Any failure of the backing store. The transaction it happened in has
  /// been rolled back.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::BadRequest(_) => ErrorKind::BadRequest,
      Self::RateLimited(_) => ErrorKind::RateLimited,
      Self::Forbidden(_) => ErrorKind::Forbidden,
      Self::Locked(_) => ErrorKind::Locked,
      Self::Storage(_) => ErrorKind::Internal,
    }
  }

  /// Wrap an arbitrary backend error as [`Error::Storage`].
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
