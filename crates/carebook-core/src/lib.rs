//! Core types and services for the Carebook facility record store.
//!
//! Records live in three positional grids (master settings, daily support
//! log, roster). This crate owns the grid abstraction, the row-location
//! heuristics, the cell codec and every domain operation; it has no HTTP or
//! database dependencies. Storage backends implement [`grid::Sheet`].

// We intentionally use native `async fn` in traits.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod attendance;
pub mod billing;
pub mod cell;
pub mod codec;
pub mod duration;
pub mod error;
pub mod facility;
pub mod grid;
pub mod labels;
pub mod master;
pub mod records;
pub mod scan;
pub mod schema;
pub mod staff;
pub mod support;
pub mod sync;

pub use error::{Error, Result};
pub use facility::{Facility, SyncPolicy};
