//! Check-in, check-out and attendance edits on the support log, plus the
//! log read paths (daily list, scheduled users, history, health history).
//!
//! The log has no uniqueness constraint. At most one row per (date, name) is
//! kept by locating under the log lock before every insert.

use std::collections::BTreeMap;

use chrono::{Datelike as _, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  Error, Facility, Result,
  cell::CellValue,
  codec,
  duration::{WorkInputs, work_hours},
  error::storage,
  grid::Sheet,
  labels::NOT_USING,
  records::{AttendanceRecord, AttendanceUpdate, CheckIn, CheckOut},
  scan::{LocateMode, RowKey, find_insert_row, locate, read_trailing},
  schema::{LOG_FIRST_ROW, LOG_WIDTH, LogColumn as C},
};

/// A user expected on a given day, with what has been recorded so far.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledUser {
  pub user_name:            String,
  pub scheduled_attendance: String,
  pub has_checked_in:       bool,
  pub attendance:           Option<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
  pub date:             String,
  pub health_condition: String,
}

/// Outcome of [`Facility::update_attendance`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdated {
  pub record:  AttendanceRecord,
  /// The row did not exist and was created.
  pub created: bool,
}

fn require_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    Err(Error::validation("利用者名を入力してください"))
  } else {
    Ok(name.to_string())
  }
}

/// Recompute the stored work hours from the row's own clock and break cells.
pub(crate) fn recompute_work(row: &mut [CellValue]) {
  let hours = work_hours(WorkInputs {
    check_in:    &row[C::CheckinTime.idx()],
    check_out:   &row[C::CheckoutTime.idx()],
    lunch_break: &row[C::LunchBreak.idx()],
    short_break: &row[C::ShortBreak.idx()],
    other_break: &row[C::OtherBreak.idx()],
  });
  row[C::WorkHours.idx()] = hours.map(CellValue::Number).unwrap_or_default();
}

fn set(row: &mut [CellValue], col: C, value: CellValue) { row[col.idx()] = value; }

impl<S: Sheet> Facility<S> {
  pub(crate) async fn read_log_row(&self, row: u32) -> Result<Vec<CellValue>> {
    let mut cells = self
      .log
      .read_range(row, 1, 1, LOG_WIDTH)
      .await
      .map_err(storage)?
      .pop()
      .unwrap_or_default();
    cells.resize(LOG_WIDTH as usize, CellValue::Empty);
    Ok(cells)
  }

  /// Rows dated `date` in the recent window, newest first. Blank-name rows
  /// are skipped; a run of them ends the walk.
  pub(crate) async fn recent_rows_on(&self, date: NaiveDate) -> Result<Vec<(u32, Vec<CellValue>)>> {
    let Some((start, rows)) = read_trailing(&self.log, self.scan.recent_window, LOG_WIDTH, &self.scan)
      .await
      .map_err(storage)?
    else {
      return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let mut blanks = 0;
    for (offset, row) in rows.into_iter().enumerate().rev() {
      if row[C::UserName.idx()].is_blank() {
        blanks += 1;
        if blanks >= self.scan.blank_run_limit {
          break;
        }
        continue;
      }
      blanks = 0;
      if codec::parse_date(&row[C::Date.idx()]) == Some(date) {
        out.push((start + offset as u32, row));
      }
    }
    Ok(out)
  }

  /// The scheduled label for a check-in: the master weekday column first,
  /// then the caller's fallback.
  async fn scheduled_for(&self, name: &str, date: NaiveDate, fallback: Option<&str>) -> Result<Option<String>> {
    Ok(
      self
        .scheduled_label(name, date.weekday())
        .await?
        .or_else(|| fallback.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)),
    )
  }

  /// Fast lookup of the row for `key`. With `widen`, a miss is retried over
  /// the whole log; rows for past dates often sit outside the fast window.
  async fn find_log_row(&self, key: &RowKey, widen: bool) -> Result<Option<u32>> {
    if let Some(row) = locate(&self.log, key, LocateMode::Fast, &self.scan).await.map_err(storage)? {
      return Ok(Some(row));
    }
    if !widen {
      return Ok(None);
    }
    debug!(name = %key.name, date = %key.date, "fast lookup missed, scanning whole log");
    locate(&self.log, key, LocateMode::Exhaustive, &self.scan).await.map_err(storage)
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// `attendance/checkin`: create the day's row. A second check-in for the
  /// same (date, name) is a conflict.
  pub async fn check_in(&self, input: CheckIn, today: NaiveDate) -> Result<AttendanceRecord> {
    let name = require_name(&input.user_name)?;
    let date = input.date.unwrap_or(today);
    let key = RowKey::new(date, &name);

    let _guard = self.log_lock.lock().await;
    if self.find_log_row(&key, date != today).await?.is_some() {
      return Err(Error::conflict("既に出勤登録されています"));
    }
    let scheduled = self.scheduled_for(&name, date, input.scheduled_use.as_deref()).await?;
    let row = find_insert_row(&self.log, C::Date.col(), LOG_FIRST_ROW, self.scan.insert_scan_rows)
      .await
      .map_err(storage)?;

    let record = AttendanceRecord {
      row_number: row,
      date: Some(codec::format_date(date)),
      user_name: Some(name.clone()),
      scheduled_attendance: scheduled,
      attendance_status: input.attendance_status,
      morning_task: input.morning_task,
      afternoon_task: input.afternoon_task,
      health_condition: input.health_condition,
      sleep_condition: input.sleep_condition,
      checkin_comment: input.checkin_comment,
      checkin_time: input.checkin_time,
      ..Default::default()
    };
    let mut cells = codec::encode_attendance(&record);
    cells.truncate(C::CheckinTime.col() as usize);
    self.log.write_row(row, 1, cells.clone()).await.map_err(storage)?;

    info!(%name, %date, row, "checked in");
    Ok(codec::decode_attendance(&cells, row))
  }

  /// `attendance/checkout`: fill the check-out block of an existing row and
  /// compute the work duration.
  pub async fn check_out(&self, input: CheckOut, today: NaiveDate) -> Result<AttendanceRecord> {
    let name = require_name(&input.user_name)?;
    let date = input.date.unwrap_or(today);
    let key = RowKey::new(date, &name);

    let _guard = self.log_lock.lock().await;
    let row = self
      .find_log_row(&key, date != today)
      .await?
      .ok_or_else(|| Error::not_found("出勤記録が見つかりません"))?;

    let mut cells = self.read_log_row(row).await?;
    set(&mut cells, C::Fatigue, codec::text_cell(input.fatigue.as_deref()));
    set(&mut cells, C::Stress, codec::text_cell(input.stress.as_deref()));
    set(&mut cells, C::CheckoutComment, codec::text_cell(input.checkout_comment.as_deref()));
    set(&mut cells, C::CheckoutTime, codec::time_cell(input.checkout_time.as_deref()));
    set(&mut cells, C::LunchBreak, codec::time_cell(input.lunch_break.as_deref()));
    set(&mut cells, C::ShortBreak, codec::time_cell(input.short_break.as_deref()));
    set(&mut cells, C::OtherBreak, codec::time_cell(input.other_break.as_deref()));
    recompute_work(&mut cells);

    let block = cells[C::Fatigue.idx()..=C::WorkHours.idx()].to_vec();
    self.log.write_row(row, C::Fatigue.col(), block).await.map_err(storage)?;

    info!(%name, %date, row, "checked out");
    Ok(codec::decode_attendance(&cells, row))
  }

  /// `attendance/update`: merge the supplied fields into the day's row,
  /// creating it when absent. Work duration is recomputed whenever a clock
  /// or break field changes.
  pub async fn update_attendance(&self, input: AttendanceUpdate) -> Result<AttendanceUpdated> {
    let name = require_name(&input.user_name)?;
    let date = input.date.ok_or_else(|| Error::validation("日付を入力してください"))?;
    let key = RowKey::new(date, &name);

    let _guard = self.log_lock.lock().await;
    let found = self.find_log_row(&key, true).await?;

    let Some(row) = found else {
      let row = find_insert_row(&self.log, C::Date.col(), LOG_FIRST_ROW, self.scan.insert_scan_rows)
        .await
        .map_err(storage)?;
      let record = AttendanceRecord {
        row_number: row,
        date: Some(codec::format_date(date)),
        user_name: Some(name.clone()),
        scheduled_attendance: self.scheduled_for(&name, date, input.scheduled_use.as_deref()).await?,
        attendance_status: input.attendance_status,
        checkin_time: input.checkin_time,
        checkout_time: input.checkout_time,
        lunch_break: input.lunch_break,
        short_break: input.short_break,
        other_break: input.other_break,
        ..Default::default()
      };
      let mut cells = codec::encode_attendance(&record);
      recompute_work(&mut cells);
      cells.truncate(C::WorkHours.col() as usize);
      self.log.write_row(row, 1, cells.clone()).await.map_err(storage)?;
      info!(%name, %date, row, "attendance created by update");
      return Ok(AttendanceUpdated { record: codec::decode_attendance(&cells, row), created: true });
    };

    let mut cells = self.read_log_row(row).await?;
    let touches_duration = input.touches_duration();
    if let Some(v) = input.attendance_status.as_deref() {
      set(&mut cells, C::Attendance, CellValue::text(v.trim()));
    }
    for (col, value) in [
      (C::CheckinTime, &input.checkin_time),
      (C::CheckoutTime, &input.checkout_time),
      (C::LunchBreak, &input.lunch_break),
      (C::ShortBreak, &input.short_break),
      (C::OtherBreak, &input.other_break),
    ] {
      if let Some(v) = value.as_deref() {
        set(&mut cells, col, codec::time_cell(Some(v)));
      }
    }
    if touches_duration {
      recompute_work(&mut cells);
    }
    self.log.write_row(row, 1, cells.clone()).await.map_err(storage)?;

    info!(%name, %date, row, "attendance updated");
    Ok(AttendanceUpdated { record: codec::decode_attendance(&cells, row), created: false })
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// `attendance/daily/{date}`: the day's rows in the recent window.
  pub async fn daily_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
    let rows = self.recent_rows_on(date).await?;
    Ok(rows.iter().map(|(row, cells)| codec::decode_attendance(cells, *row)).collect())
  }

  /// `attendance/user/{name}/{date}` (fast) and
  /// `attendance/search/{name}/{date}` (exhaustive).
  pub async fn user_attendance(
    &self,
    name: &str,
    date: NaiveDate,
    mode: LocateMode,
  ) -> Result<Option<AttendanceRecord>> {
    let key = RowKey::new(date, require_name(name)?);
    let Some(row) = locate(&self.log, &key, mode, &self.scan).await.map_err(storage)? else {
      debug!(name, %date, ?mode, "no attendance row");
      return Ok(None);
    };
    let cells = self.read_log_row(row).await?;
    Ok(Some(codec::decode_attendance(&cells, row)))
  }

  /// `attendance/scheduled/{date}`: active users whose weekday label is set
  /// and not `非利用`, with that day's record if one exists.
  pub async fn scheduled_users(&self, date: NaiveDate) -> Result<Vec<ScheduledUser>> {
    let mut recorded: BTreeMap<String, AttendanceRecord> = BTreeMap::new();
    for (row, cells) in self.recent_rows_on(date).await? {
      let rec = codec::decode_attendance(&cells, row);
      if let Some(name) = rec.user_name.clone() {
        recorded.entry(name).or_insert(rec);
      }
    }

    let users = self.active_users().await?;
    Ok(
      users
        .into_iter()
        .filter_map(|u| {
          let label = u.scheduled_on(date.weekday()).to_string();
          if label.is_empty() || label.contains(NOT_USING) {
            return None;
          }
          let attendance = recorded.remove(&u.name);
          Some(ScheduledUser {
            user_name: u.name,
            scheduled_attendance: label,
            has_checked_in: attendance.is_some(),
            attendance,
          })
        })
        .collect(),
    )
  }

  /// `attendance/history/{name}`: the user's most recent rows, newest first.
  pub async fn user_history(&self, name: &str) -> Result<Vec<AttendanceRecord>> {
    let name = require_name(name)?;
    let Some((start, rows)) = read_trailing(&self.log, self.scan.history_window, LOG_WIDTH, &self.scan)
      .await
      .map_err(storage)?
    else {
      return Ok(Vec::new());
    };
    Ok(
      rows
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, cells)| codec::text(&cells[C::UserName.idx()]) == name)
        .take(self.scan.history_limit)
        .map(|(offset, cells)| codec::decode_attendance(cells, start + offset as u32))
        .collect(),
    )
  }

  /// `attendance/health-batch`: recent health self-reports per user, newest
  /// first. Every requested name appears in the result.
  pub async fn health_history(&self, names: &[String]) -> Result<BTreeMap<String, Vec<HealthEntry>>> {
    let mut out: BTreeMap<String, Vec<HealthEntry>> =
      names.iter().map(|n| (n.trim().to_string(), Vec::new())).collect();
    if out.is_empty() {
      return Ok(out);
    }
    let Some((_, rows)) = read_trailing(&self.log, self.scan.health_window, C::Health.col(), &self.scan)
      .await
      .map_err(storage)?
    else {
      return Ok(out);
    };

    let limit = self.scan.health_limit;
    let mut complete = 0;
    for cells in rows.iter().rev() {
      if complete == out.len() {
        break;
      }
      let name = codec::text(&cells[C::UserName.idx()]);
      let Some(entries) = out.get_mut(&name) else { continue };
      if entries.len() >= limit {
        continue;
      }
      entries.push(HealthEntry {
        date:             codec::parse_date(&cells[C::Date.idx()])
          .map(codec::format_date)
          .unwrap_or_else(|| codec::text(&cells[C::Date.idx()])),
        health_condition: codec::text(&cells[C::Health.idx()]),
      });
      if entries.len() == limit {
        complete += 1;
      }
    }
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facility::testing::{date, facility, seed_user};

  const WEEK: [&str; 7] = ["通所", "通所", "通所", "通所", "在宅", "", "非利用"];

  fn check_in(name: &str, day: &str, time: &str) -> CheckIn {
    CheckIn {
      user_name: name.into(),
      date: Some(date(day)),
      attendance_status: Some("出勤".into()),
      health_condition: Some("良好".into()),
      checkin_time: Some(time.into()),
      ..Default::default()
    }
  }

  fn check_out(name: &str, day: &str, time: &str, lunch: &str) -> CheckOut {
    CheckOut {
      user_name: name.into(),
      date: Some(date(day)),
      checkout_time: Some(time.into()),
      lunch_break: Some(lunch.into()),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn check_in_out_scenario() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "契約中", WEEK).await;
    let today = date("2025-01-15");

    // 2025-01-15 is a Wednesday.
    let rec = f.check_in(check_in("山田太郎", "2025-01-15", "9:00"), today).await.unwrap();
    assert_eq!(rec.row_number, 2);
    assert_eq!(rec.scheduled_attendance.as_deref(), Some("通所"));
    assert_eq!(rec.checkin_time.as_deref(), Some("09:00"));

    let out = f.check_out(check_out("山田太郎", "2025-01-15", "17:00", "1:00"), today).await.unwrap();
    assert_eq!(out.work_hours, Some(7.0));
    assert_eq!(out.work_minutes, Some(420));
    assert_eq!(out.checkin_time.as_deref(), Some("09:00"));
    assert_eq!(out.health_condition.as_deref(), Some("良好"));

    let again = f.check_in(check_in("山田太郎", "2025-01-15", "10:00"), today).await.unwrap_err();
    assert!(matches!(again, Error::Conflict(_)));

    let daily = f.daily_attendance(today).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].work_minutes, Some(420));
  }

  #[tokio::test]
  async fn schedule_fallback_when_master_is_blank() {
    let f = facility();
    let mut input = check_in("新人", "2025-01-18", "9:00");
    input.scheduled_use = Some("体験".into());
    let rec = f.check_in(input, date("2025-01-18")).await.unwrap();
    assert_eq!(rec.scheduled_attendance.as_deref(), Some("体験"));
  }

  #[tokio::test]
  async fn checkout_without_checkin_is_not_found() {
    let f = facility();
    let err = f
      .check_out(check_out("山田太郎", "2025-01-15", "17:00", "1:00"), date("2025-01-15"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn check_in_reuses_blank_slot() {
    let f = facility();
    let today = date("2025-01-15");
    for name in ["a", "b", "c"] {
      f.check_in(check_in(name, "2025-01-15", "9:00"), today).await.unwrap();
    }
    f.log.clear_row(3, 1, LOG_WIDTH).await.unwrap();
    let rec = f.check_in(check_in("d", "2025-01-15", "9:00"), today).await.unwrap();
    assert_eq!(rec.row_number, 3);
  }

  #[tokio::test]
  async fn update_creates_then_merges() {
    let f = facility();
    let upd = |status: Option<&str>, checkout: Option<&str>| AttendanceUpdate {
      user_name: "山田太郎".into(),
      date: Some(date("2025-01-15")),
      attendance_status: status.map(Into::into),
      checkin_time: checkout.map(|_| "09:00".into()),
      checkout_time: checkout.map(Into::into),
      ..Default::default()
    };

    let first = f.update_attendance(upd(Some("遅刻"), None)).await.unwrap();
    assert!(first.created);
    let created = first.record;
    assert_eq!(created.attendance_status.as_deref(), Some("遅刻"));
    assert_eq!(created.work_hours, None);

    let second = f.update_attendance(upd(None, Some("12:00"))).await.unwrap();
    assert!(!second.created);
    let merged = second.record;
    assert_eq!(merged.row_number, created.row_number);
    assert_eq!(merged.attendance_status.as_deref(), Some("遅刻"));
    assert_eq!(merged.work_hours, Some(3.0));

    let key = RowKey::new(date("2025-01-15"), "山田太郎");
    let cfg = f.scan_config().clone();
    assert!(locate(&f.log, &key, LocateMode::Exhaustive, &cfg).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn past_date_rows_outside_recent_window_are_found() {
    let f = facility();
    let today = date("2025-02-20");
    let old = date("2025-01-06");
    f.check_in(check_in("山田太郎", "2025-01-06", "9:00"), today).await.unwrap();
    for row in 3..=160 {
      f.log
        .write_row(row, 1, vec![CellValue::date(date("2025-02-03")), CellValue::text(format!("filler{row}"))])
        .await
        .unwrap();
    }
    let key = RowKey::new(old, "山田太郎");
    let cfg = f.scan_config().clone();
    assert_eq!(locate(&f.log, &key, LocateMode::Fast, &cfg).await.unwrap(), None);

    let err = f.check_in(check_in("山田太郎", "2025-01-06", "9:30"), today).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let updated = f
      .update_attendance(AttendanceUpdate {
        user_name: "山田太郎".into(),
        date: Some(old),
        checkout_time: Some("12:00".into()),
        ..Default::default()
      })
      .await
      .unwrap();
    assert!(!updated.created);
    assert_eq!(updated.record.row_number, 2);
    assert_eq!(updated.record.work_hours, Some(3.0));

    let out = f.check_out(check_out("山田太郎", "2025-01-06", "15:00", "0:00"), today).await.unwrap();
    assert_eq!(out.row_number, 2);

    let all = f.log.read_range(2, 1, 200, 2).await.unwrap();
    assert_eq!(all.iter().filter(|r| key.matches(r)).count(), 1);
  }

  #[tokio::test]
  async fn at_most_one_row_per_key() {
    let f = facility();
    let today = date("2025-01-15");
    f.check_in(check_in("山田太郎", "2025-01-15", "9:00"), today).await.unwrap();
    let _ = f.check_in(check_in("山田太郎", "2025-01-15", "9:30"), today).await;
    f.update_attendance(AttendanceUpdate {
      user_name: "山田太郎".into(),
      date: Some(today),
      checkout_time: Some("15:00".into()),
      ..Default::default()
    })
    .await
    .unwrap();
    f.check_out(check_out("山田太郎", "2025-01-15", "16:00", "0:30"), today).await.unwrap();

    let all = f.log.read_range(2, 1, 10, 2).await.unwrap();
    let hits = all.iter().filter(|r| RowKey::new(today, "山田太郎").matches(r)).count();
    assert_eq!(hits, 1);
  }

  #[tokio::test]
  async fn scheduled_users_reflect_check_ins() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "契約中", WEEK).await;
    seed_user(&f, 9, "佐藤花子", "契約中", ["在宅"; 7]).await;
    seed_user(&f, 10, "鈴木一郎", "退所済み", ["通所"; 7]).await;
    let friday = date("2025-01-17");
    f.check_in(check_in("佐藤花子", "2025-01-17", "9:00"), friday).await.unwrap();

    let users = f.scheduled_users(friday).await.unwrap();
    assert_eq!(users.len(), 2);
    let sato = users.iter().find(|u| u.user_name == "佐藤花子").unwrap();
    assert!(sato.has_checked_in);
    let yamada = users.iter().find(|u| u.user_name == "山田太郎").unwrap();
    assert_eq!(yamada.scheduled_attendance, "在宅");
    assert!(!yamada.has_checked_in);

    // Sunday is 非利用 for 山田.
    let sunday = f.scheduled_users(date("2025-01-19")).await.unwrap();
    assert_eq!(sunday.len(), 1);
  }

  #[tokio::test]
  async fn history_is_newest_first_and_limited() {
    let f = facility();
    let start = date("2025-01-01");
    for i in 0..60 {
      let day = start + chrono::Days::new(i);
      let input = CheckIn { user_name: "山田太郎".into(), date: Some(day), ..Default::default() };
      f.check_in(input, day).await.unwrap();
    }
    let history = f.user_history("山田太郎").await.unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].date.as_deref(), Some("2025-03-01"));
    assert!(f.user_history("誰か").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn health_history_per_user() {
    let f = facility();
    let start = date("2025-01-01");
    for i in 0..10 {
      let day = start + chrono::Days::new(i);
      for name in ["a", "b"] {
        let mut input = check_in(name, "2025-01-01", "9:00");
        input.date = Some(day);
        f.check_in(input, day).await.unwrap();
      }
    }
    let names = vec!["a".to_string(), "zz".to_string()];
    let health = f.health_history(&names).await.unwrap();
    assert_eq!(health["a"].len(), 7);
    assert_eq!(health["a"][0].date, "2025-01-10");
    assert_eq!(health["a"][0].health_condition, "良好");
    assert!(health["zz"].is_empty());
  }
}
