//! Error type for `roadwatch-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid column value: {0}")]
  Decode(String),

  #[error("transaction abandoned by its caller")]
  Cancelled,
}

impl From<Error> for roadwatch_core::Error {
  fn from(e: Error) -> Self { roadwatch_core::Error::storage(e) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
