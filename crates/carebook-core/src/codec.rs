//! RecordCodec: coercion between raw cells and record fields.
//!
//! Decoding is total. Malformed cells degrade to `None` or `false` and never
//! produce an error, because any cell may have been hand-edited.

use chrono::{NaiveDate, NaiveTime, Timelike as _};

use crate::{
  cell::CellValue,
  duration::{hours_to_minutes, round2},
  records::{AttendanceRecord, SupportRecord},
  schema::LogColumn as C,
};

/// Marker written to evaluation-flag cells.
pub const FLAG_MARK: &str = "○";

// ─── Primitive coercions ─────────────────────────────────────────────────────

/// Blank cells become `None`; everything else its display string.
pub fn opt_text(cell: &CellValue) -> Option<String> {
  if cell.is_blank() { None } else { Some(cell.display()) }
}

/// Display string, empty for blank cells.
pub fn text(cell: &CellValue) -> String { cell.display().trim().to_string() }

fn number(cell: &CellValue) -> Option<f64> {
  match cell {
    CellValue::Number(n) if n.is_finite() => Some(*n),
    CellValue::Text(s) => {
      let s = s.trim();
      if s.starts_with('#') {
        return None;
      }
      s.parse::<f64>().ok().filter(|n| n.is_finite())
    }
    _ => None,
  }
}

/// Integer coercion; error sentinels (`#VALUE!`) and non-numbers are `None`.
pub fn opt_int(cell: &CellValue) -> Option<i64> { number(cell).map(|n| n.round() as i64) }

/// Hour counts keep two decimals.
pub fn opt_hours(cell: &CellValue) -> Option<f64> { number(cell).map(round2) }

/// Parse `H:MM` / `HH:MM` (seconds tolerated) into a time of day.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
  let s = s.trim();
  let (h, rest) = s.split_once(':')?;
  let (m, sec) = match rest.split_once(':') {
    Some((m, sec)) => (m, Some(sec)),
    None => (rest, None),
  };
  if h.is_empty() || h.len() > 2 || m.len() != 2 {
    return None;
  }
  let sec = match sec {
    Some(sec) => sec.parse().ok()?,
    None => 0,
  };
  NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, sec)
}

/// Time-of-day normalised to zero-padded `HH:MM`.
pub fn opt_time(cell: &CellValue) -> Option<String> {
  let t = match cell {
    CellValue::Text(s) => parse_time(s)?,
    CellValue::DateTime(dt) => dt.time(),
    _ => return None,
  };
  Some(format!("{:02}:{:02}", t.hour(), t.minute()))
}

pub fn flag(cell: &CellValue) -> bool { cell.is_truthy() }

/// Accepts date cells and `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYYMMDD` text or
/// numbers.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
  match cell {
    CellValue::DateTime(dt) => Some(dt.date()),
    CellValue::Text(s) => parse_date_str(s),
    CellValue::Number(n) if n.fract() == 0.0 && *n > 0.0 => parse_date_str(&(*n as i64).to_string()),
    _ => None,
  }
}

pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  let s = s.split(['T', ' ']).next().unwrap_or(s);
  ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"]
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn format_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

// ─── Encoders ────────────────────────────────────────────────────────────────

/// Encode a time string: valid times become time cells, anything else is
/// kept as text so no input is lost.
pub fn time_cell(s: Option<&str>) -> CellValue {
  match s {
    None => CellValue::Empty,
    Some(s) => match parse_time(s) {
      Some(t) => CellValue::time(t),
      None => CellValue::text(s.trim()),
    },
  }
}

/// Encode a date string the same way.
pub fn date_cell(s: Option<&str>) -> CellValue {
  match s {
    None => CellValue::Empty,
    Some(s) => match parse_date_str(s) {
      Some(d) => CellValue::date(d),
      None => CellValue::text(s.trim()),
    },
  }
}

pub fn text_cell(s: Option<&str>) -> CellValue { s.map(CellValue::text).unwrap_or_default() }

pub fn flag_cell(on: bool) -> CellValue {
  if on { CellValue::text(FLAG_MARK) } else { CellValue::Empty }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

fn at(row: &[CellValue], col: C) -> &CellValue {
  const EMPTY: &CellValue = &CellValue::Empty;
  row.get(col.idx()).unwrap_or(EMPTY)
}

/// Decode the attendance columns of a log row read from column 1.
pub fn decode_attendance(row: &[CellValue], row_number: u32) -> AttendanceRecord {
  let work_hours = opt_hours(at(row, C::WorkHours));
  AttendanceRecord {
    row_number,
    date: parse_date(at(row, C::Date)).map(format_date).or_else(|| opt_text(at(row, C::Date))),
    user_name: opt_text(at(row, C::UserName)),
    scheduled_attendance: opt_text(at(row, C::Scheduled)),
    attendance_status: opt_text(at(row, C::Attendance)),
    morning_task: opt_text(at(row, C::MorningTask)),
    afternoon_task: opt_text(at(row, C::AfternoonTask)),
    workplace: opt_text(at(row, C::Workplace)),
    health_condition: opt_text(at(row, C::Health)),
    sleep_condition: opt_text(at(row, C::Sleep)),
    checkin_comment: opt_text(at(row, C::CheckinComment)),
    fatigue: opt_text(at(row, C::Fatigue)),
    stress: opt_text(at(row, C::Stress)),
    checkout_comment: opt_text(at(row, C::CheckoutComment)),
    checkin_time: opt_time(at(row, C::CheckinTime)),
    checkout_time: opt_time(at(row, C::CheckoutTime)),
    lunch_break: opt_time(at(row, C::LunchBreak)),
    short_break: opt_time(at(row, C::ShortBreak)),
    other_break: opt_time(at(row, C::OtherBreak)),
    work_hours,
    work_minutes: work_hours.map(hours_to_minutes),
    meal_service: flag(at(row, C::MealService)),
    absence_support: flag(at(row, C::AbsenceSupport)),
    visit_support: flag(at(row, C::VisitSupport)),
    transport: flag(at(row, C::Transport)),
  }
}

/// Decode a full log row.
pub fn decode_support(row: &[CellValue], row_number: u32) -> SupportRecord {
  SupportRecord {
    attendance:        decode_attendance(row, row_number),
    user_status:       opt_text(at(row, C::UserStatus)),
    work_location:     opt_text(at(row, C::WorkLocation)),
    recorder:          opt_text(at(row, C::Recorder)),
    home_support_eval: flag(at(row, C::HomeSupportEval)),
    external_eval:     flag(at(row, C::ExternalEval)),
    work_goal:         opt_text(at(row, C::WorkGoal)),
    work_eval:         opt_text(at(row, C::WorkEval)),
    employment_eval:   opt_text(at(row, C::EmploymentEval)),
    work_motivation:   opt_text(at(row, C::WorkMotivation)),
    communication:     opt_text(at(row, C::Communication)),
    evaluation:        opt_text(at(row, C::Evaluation)),
    user_feedback:     opt_text(at(row, C::UserFeedback)),
  }
}

/// Encode the attendance half of a record into the first 25 columns of a
/// full-width row. Computed and manual columns beyond are left blank.
pub fn encode_attendance(rec: &AttendanceRecord) -> Vec<CellValue> {
  let mut row = vec![CellValue::Empty; crate::schema::LOG_WIDTH as usize];
  let mut put = |col: C, v: CellValue| row[col.idx()] = v;
  put(C::Date, date_cell(rec.date.as_deref()));
  put(C::UserName, text_cell(rec.user_name.as_deref()));
  put(C::Scheduled, text_cell(rec.scheduled_attendance.as_deref()));
  put(C::Attendance, text_cell(rec.attendance_status.as_deref()));
  put(C::MorningTask, text_cell(rec.morning_task.as_deref()));
  put(C::AfternoonTask, text_cell(rec.afternoon_task.as_deref()));
  put(C::Workplace, text_cell(rec.workplace.as_deref()));
  put(C::Health, text_cell(rec.health_condition.as_deref()));
  put(C::Sleep, text_cell(rec.sleep_condition.as_deref()));
  put(C::CheckinComment, text_cell(rec.checkin_comment.as_deref()));
  put(C::Fatigue, text_cell(rec.fatigue.as_deref()));
  put(C::Stress, text_cell(rec.stress.as_deref()));
  put(C::CheckoutComment, text_cell(rec.checkout_comment.as_deref()));
  put(C::CheckinTime, time_cell(rec.checkin_time.as_deref()));
  put(C::CheckoutTime, time_cell(rec.checkout_time.as_deref()));
  put(C::LunchBreak, time_cell(rec.lunch_break.as_deref()));
  put(C::ShortBreak, time_cell(rec.short_break.as_deref()));
  put(C::OtherBreak, time_cell(rec.other_break.as_deref()));
  put(C::WorkHours, rec.work_hours.map(CellValue::Number).unwrap_or_default());
  put(C::MealService, flag_cell(rec.meal_service));
  put(C::AbsenceSupport, flag_cell(rec.absence_support));
  put(C::VisitSupport, flag_cell(rec.visit_support));
  put(C::Transport, flag_cell(rec.transport));
  row
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDateTime;

  use super::*;

  #[test]
  fn blank_text_is_none() {
    assert_eq!(opt_text(&CellValue::Empty), None);
    assert_eq!(opt_text(&CellValue::text(" ")), None);
    assert_eq!(opt_text(&CellValue::text("良好")), Some("良好".into()));
  }

  #[test]
  fn error_sentinels_are_null_numbers() {
    assert_eq!(opt_int(&CellValue::text("#VALUE!")), None);
    assert_eq!(opt_int(&CellValue::text("#REF!")), None);
    assert_eq!(opt_int(&CellValue::text("abc")), None);
    assert_eq!(opt_int(&CellValue::text("42.6")), Some(43));
    assert_eq!(opt_int(&CellValue::Number(89.5)), Some(90));
    assert_eq!(opt_hours(&CellValue::Number(7.456)), Some(7.46));
  }

  #[test]
  fn times_normalise_to_padded_hhmm() {
    assert_eq!(opt_time(&CellValue::text("9:05")), Some("09:05".into()));
    assert_eq!(opt_time(&CellValue::text("17:30")), Some("17:30".into()));
    assert_eq!(opt_time(&CellValue::text("1730")), None);
    assert_eq!(opt_time(&CellValue::text("25:00")), None);
    assert_eq!(opt_time(&CellValue::Number(0.5)), None);
    let dt = NaiveDateTime::parse_from_str("1899-12-30 08:45:00", "%Y-%m-%d %H:%M:%S").unwrap();
    assert_eq!(opt_time(&CellValue::DateTime(dt)), Some("08:45".into()));
  }

  #[test]
  fn flags_have_no_third_state() {
    assert!(flag(&CellValue::text(FLAG_MARK)));
    assert!(flag(&CellValue::Bool(true)));
    assert!(!flag(&CellValue::Empty));
    assert!(!flag(&CellValue::Number(0.0)));
  }

  #[test]
  fn dates_in_three_spellings() {
    let want = NaiveDate::from_ymd_opt(2025, 3, 9);
    assert_eq!(parse_date(&CellValue::text("2025-03-09")), want);
    assert_eq!(parse_date(&CellValue::text("2025/03/09")), want);
    assert_eq!(parse_date(&CellValue::text("20250309")), want);
    assert_eq!(parse_date(&CellValue::Number(20250309.0)), want);
    assert_eq!(parse_date(&CellValue::text("いつか")), None);
  }

  #[test]
  fn second_pass_through_codec_is_stable() {
    let mut raw = vec![CellValue::Empty; 38];
    raw[C::Date.idx()] = CellValue::text("2025/01/15");
    raw[C::UserName.idx()] = CellValue::text("山田太郎");
    raw[C::CheckinTime.idx()] = CellValue::text("9:00");
    raw[C::LunchBreak.idx()] = CellValue::text("1:00");
    raw[C::WorkHours.idx()] = CellValue::text("#VALUE!");
    raw[C::Transport.idx()] = CellValue::Bool(true);

    let first = decode_attendance(&raw, 2);
    assert_eq!(first.date.as_deref(), Some("2025-01-15"));
    assert_eq!(first.checkin_time.as_deref(), Some("09:00"));
    assert_eq!(first.work_hours, None);

    let second = decode_attendance(&encode_attendance(&first), 2);
    assert_eq!(first, second);
    let third = decode_attendance(&encode_attendance(&second), 2);
    assert_eq!(second, third);
  }
}
