//! Error types for `carebook-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A required field is missing or a value is outside its allowed set.
  #[error("{0}")]
  Validation(String),

  /// A keyed record does not exist. Callers treat this as a normal outcome.
  #[error("{0}")]
  NotFound(String),

  /// The write would violate a uniqueness rule (duplicate check-in, name,
  /// email) or the target region has no free row.
  #[error("{0}")]
  Conflict(String),

  /// An expected sheet is missing from the backing store.
  #[error("sheet not found: {0}")]
  SheetNotFound(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }

  pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

  pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }
}

/// Wrap a backend error; used as `.map_err(storage)`.
pub fn storage<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Storage(Box::new(e))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
