//! Net work duration from time-of-day serials.
//!
//! Every time-like input, breaks included, is converted to a fractional-day
//! serial (midnight = 0.0, noon = 0.5). A break of one hour is therefore
//! stored as the time `1:00`. Net hours are
//! `(out − in − lunch − short − other) × 24`, rounded to two decimals and
//! clamped at zero.

use chrono::Timelike as _;

use crate::cell::CellValue;

/// Convert a cell to a fractional-day serial. Numbers pass through; anything
/// unparseable counts as zero.
pub fn time_serial(cell: &CellValue) -> f64 {
  match cell {
    CellValue::Number(n) if n.is_finite() => *n,
    CellValue::DateTime(dt) => {
      let t = dt.time();
      (t.hour() as f64 + t.minute() as f64 / 60.0 + t.second() as f64 / 3600.0) / 24.0
    }
    CellValue::Text(s) => text_serial(s).unwrap_or(0.0),
    _ => 0.0,
  }
}

fn text_serial(s: &str) -> Option<f64> {
  let mut parts = s.trim().split(':');
  let h: u32 = parts.next()?.trim().parse().ok()?;
  let m: u32 = parts.next()?.trim().parse().ok()?;
  let sec: u32 = match parts.next() {
    Some(p) => p.trim().parse().ok()?,
    None => 0,
  };
  if parts.next().is_some() || m >= 60 || sec >= 60 {
    return None;
  }
  Some((h as f64 + m as f64 / 60.0 + sec as f64 / 3600.0) / 24.0)
}

/// Break and clock inputs for one day's record.
#[derive(Debug, Clone, Copy)]
pub struct WorkInputs<'a> {
  pub check_in:    &'a CellValue,
  pub check_out:   &'a CellValue,
  pub lunch_break: &'a CellValue,
  pub short_break: &'a CellValue,
  pub other_break: &'a CellValue,
}

/// Net hours worked, or `None` while the check-out time is absent.
///
/// The result is never negative: overnight wraps and entry mistakes clamp to
/// zero instead of failing.
pub fn work_hours(inputs: WorkInputs<'_>) -> Option<f64> {
  if inputs.check_out.is_blank() {
    return None;
  }
  let net = time_serial(inputs.check_out)
    - time_serial(inputs.check_in)
    - time_serial(inputs.lunch_break)
    - time_serial(inputs.short_break)
    - time_serial(inputs.other_break);
  let hours = net * 24.0;
  if hours > 0.0 { Some(round2(hours)) } else { Some(0.0) }
}

/// Whole minutes for a stored hour count.
pub fn hours_to_minutes(hours: f64) -> i64 { (hours * 60.0).round() as i64 }

pub fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

#[cfg(test)]
mod tests {
  use chrono::NaiveTime;

  use super::*;

  fn t(s: &str) -> CellValue { CellValue::text(s) }

  fn hours(check_in: &str, check_out: &str, lunch: &str, short: &str, other: &str) -> Option<f64> {
    work_hours(WorkInputs {
      check_in:    &t(check_in),
      check_out:   &t(check_out),
      lunch_break: &t(lunch),
      short_break: &t(short),
      other_break: &t(other),
    })
  }

  #[test]
  fn serial_conversions() {
    assert_eq!(time_serial(&t("12:00")), 0.5);
    assert_eq!(time_serial(&CellValue::Number(0.25)), 0.25);
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    assert_eq!(time_serial(&CellValue::time(noon)), 0.5);
    assert_eq!(time_serial(&t("garbage")), 0.0);
    assert_eq!(time_serial(&t("9:75")), 0.0);
    assert_eq!(time_serial(&CellValue::Empty), 0.0);
  }

  #[test]
  fn seven_net_hours_after_lunch() {
    assert_eq!(hours("09:00", "17:00", "1:00", "", ""), Some(7.0));
  }

  #[test]
  fn all_breaks_deducted() {
    assert_eq!(hours("9:00", "16:00", "0:45", "0:15", "0:30"), Some(5.5));
  }

  #[test]
  fn rounds_to_two_decimals() {
    assert_eq!(hours("09:00", "09:20", "", "", ""), Some(0.33));
  }

  #[test]
  fn missing_checkout_is_not_computed() {
    assert_eq!(hours("09:00", "", "1:00", "", ""), None);
  }

  #[test]
  fn never_negative() {
    assert_eq!(hours("22:00", "06:00", "", "", ""), Some(0.0));
    assert_eq!(hours("09:00", "10:00", "2:00", "", ""), Some(0.0));
    for out in ["00:00", "08:59", "09:00", "23:59"] {
      assert!(hours("09:00", out, "0:30", "0:10", "0:05").unwrap() >= 0.0);
    }
  }

  #[test]
  fn minutes_from_hours() {
    assert_eq!(hours_to_minutes(7.0), 420);
    assert_eq!(hours_to_minutes(0.33), 20);
  }
}
