//! `CellValue`: the untyped content of one grid cell.
//!
//! Raw cells never leave the storage and codec layers; domain code reads them
//! through [`crate::codec`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// The date spreadsheets attach to a pure time-of-day value.
pub const TIME_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1899, 12, 30) {
  Some(d) => d,
  None => panic!("invalid time epoch"),
};

/// One of the five shapes a grid cell can hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
  #[default]
  Empty,
  Text(String),
  Number(f64),
  Bool(bool),
  DateTime(NaiveDateTime),
}

impl CellValue {
  /// Text cell, or `Empty` for an empty string.
  pub fn text(s: impl Into<String>) -> Self {
    let s = s.into();
    if s.is_empty() { Self::Empty } else { Self::Text(s) }
  }

  /// A time-of-day cell anchored at [`TIME_EPOCH`].
  pub fn time(t: NaiveTime) -> Self { Self::DateTime(TIME_EPOCH.and_time(t)) }

  pub fn date(d: NaiveDate) -> Self { Self::DateTime(d.and_time(NaiveTime::MIN)) }

  /// Empty cells and whitespace-only text count as blank.
  pub fn is_blank(&self) -> bool {
    match self {
      Self::Empty => true,
      Self::Text(s) => s.trim().is_empty(),
      _ => false,
    }
  }

  /// Loose truthiness: non-blank text, non-zero numbers, `true`, any date.
  pub fn is_truthy(&self) -> bool {
    match self {
      Self::Empty => false,
      Self::Text(s) => !s.trim().is_empty(),
      Self::Number(n) => *n != 0.0 && !n.is_nan(),
      Self::Bool(b) => *b,
      Self::DateTime(_) => true,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Render the cell the way a spreadsheet would stringify it. Blank cells
  /// render as the empty string.
  pub fn display(&self) -> String {
    match self {
      Self::Empty => String::new(),
      Self::Text(s) => s.clone(),
      Self::Number(n) => format_number(*n),
      Self::Bool(b) => b.to_string(),
      Self::DateTime(dt) => {
        if dt.date() == TIME_EPOCH {
          dt.format("%H:%M").to_string()
        } else if dt.time() == NaiveTime::MIN {
          dt.format("%Y-%m-%d").to_string()
        } else {
          dt.format("%Y-%m-%d %H:%M:%S").to_string()
        }
      }
    }
  }
}

fn format_number(n: f64) -> String {
  if n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  } else {
    n.to_string()
  }
}

impl From<&str> for CellValue {
  fn from(s: &str) -> Self { Self::text(s) }
}

impl From<String> for CellValue {
  fn from(s: String) -> Self { Self::text(s) }
}

impl From<Option<String>> for CellValue {
  fn from(s: Option<String>) -> Self { s.map(Self::text).unwrap_or_default() }
}

impl From<f64> for CellValue {
  fn from(n: f64) -> Self { Self::Number(n) }
}

impl From<bool> for CellValue {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<NaiveDateTime> for CellValue {
  fn from(dt: NaiveDateTime) -> Self { Self::DateTime(dt) }
}
