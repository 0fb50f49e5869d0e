//! SQLite backend for the carebook grid.
//!
//! Each sheet is a sparse set of `(row, col)` cells in one table. Wraps
//! [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteSheet, SqliteStore};

#[cfg(test)]
mod tests;
