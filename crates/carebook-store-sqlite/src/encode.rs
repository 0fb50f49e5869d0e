//! Cell values to and from the `(kind, value)` text pair stored per cell.
//!
//! Numbers use Rust's shortest round-trip formatting. Date-times are stored
//! as ISO 8601 without a zone, matching the naive values the grid holds.

use carebook_core::cell::CellValue;
use chrono::NaiveDateTime;

use crate::{Error, Result};

const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `None` for cells that are not stored at all.
pub fn encode_cell(cell: &CellValue) -> Option<(&'static str, String)> {
  match cell {
    CellValue::Empty => None,
    CellValue::Text(s) => Some(("text", s.clone())),
    CellValue::Number(n) => Some(("number", n.to_string())),
    CellValue::Bool(b) => Some(("bool", b.to_string())),
    CellValue::DateTime(dt) => Some(("datetime", dt.format(DT_FORMAT).to_string())),
  }
}

/// One cell as read from the `cells` table.
#[derive(Debug)]
pub struct RawCell {
  pub row:   u32,
  pub col:   u32,
  pub kind:  String,
  pub value: String,
}

impl RawCell {
  pub fn decode(self) -> Result<CellValue> {
    let corrupt = |reason: String| Error::CorruptCell { row: self.row, col: self.col, reason };
    match self.kind.as_str() {
      "text" => Ok(CellValue::Text(self.value)),
      "number" => self
        .value
        .parse()
        .map(CellValue::Number)
        .map_err(|e| corrupt(format!("{e}: {:?}", self.value))),
      "bool" => self
        .value
        .parse()
        .map(CellValue::Bool)
        .map_err(|e| corrupt(format!("{e}: {:?}", self.value))),
      "datetime" => NaiveDateTime::parse_from_str(&self.value, DT_FORMAT)
        .map(CellValue::DateTime)
        .map_err(|e| corrupt(format!("{e}: {:?}", self.value))),
      other => Err(corrupt(format!("unknown cell kind {other:?}"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use carebook_core::cell::TIME_EPOCH;
  use chrono::NaiveTime;

  use super::*;

  fn through_storage(cell: CellValue) -> CellValue {
    let (kind, value) = encode_cell(&cell).unwrap();
    RawCell { row: 1, col: 1, kind: kind.into(), value }.decode().unwrap()
  }

  #[test]
  fn empty_is_not_stored() {
    assert!(encode_cell(&CellValue::Empty).is_none());
  }

  #[test]
  fn fractional_numbers_survive() {
    assert_eq!(through_storage(CellValue::Number(7.33)), CellValue::Number(7.33));
    assert_eq!(through_storage(CellValue::Number(0.1 + 0.2)), CellValue::Number(0.1 + 0.2));
  }

  #[test]
  fn times_keep_their_epoch() {
    let t = TIME_EPOCH.and_time(NaiveTime::from_hms_opt(9, 5, 0).unwrap());
    assert_eq!(through_storage(CellValue::DateTime(t)), CellValue::DateTime(t));
  }

  #[test]
  fn unknown_kind_is_corrupt() {
    let raw = RawCell { row: 4, col: 2, kind: "blob".into(), value: String::new() };
    assert!(matches!(raw.decode(), Err(Error::CorruptCell { row: 4, col: 2, .. })));
  }
}
