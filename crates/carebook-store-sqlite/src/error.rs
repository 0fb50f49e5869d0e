//! Error type for `carebook-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sheet not found: {0}")]
  SheetNotFound(String),

  /// A stored cell whose kind or text cannot be decoded.
  #[error("corrupt cell ({row}, {col}): {reason}")]
  CorruptCell { row: u32, col: u32, reason: String },
}

impl From<Error> for carebook_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::SheetNotFound(name) => Self::SheetNotFound(name),
      other => carebook_core::error::storage(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
