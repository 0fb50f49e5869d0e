//! Structured records and write payloads.
//!
//! Records are produced by [`crate::codec`] from raw rows; payloads are what
//! callers hand to the [`crate::Facility`] write operations. All types use
//! camelCase on the wire.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ─── Log records ─────────────────────────────────────────────────────────────

/// The attendance half of a support-log row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
  pub row_number:           u32,
  pub date:                 Option<String>,
  pub user_name:            Option<String>,
  pub scheduled_attendance: Option<String>,
  pub attendance_status:    Option<String>,
  pub morning_task:         Option<String>,
  pub afternoon_task:       Option<String>,
  pub workplace:            Option<String>,
  pub health_condition:     Option<String>,
  pub sleep_condition:      Option<String>,
  pub checkin_comment:      Option<String>,
  pub fatigue:              Option<String>,
  pub stress:               Option<String>,
  pub checkout_comment:     Option<String>,
  pub checkin_time:         Option<String>,
  pub checkout_time:        Option<String>,
  pub lunch_break:          Option<String>,
  pub short_break:          Option<String>,
  pub other_break:          Option<String>,
  pub work_hours:           Option<f64>,
  pub work_minutes:         Option<i64>,
  pub meal_service:         bool,
  pub absence_support:      bool,
  pub visit_support:        bool,
  pub transport:            bool,
}

/// A full support-log row: attendance plus the manually entered block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRecord {
  #[serde(flatten)]
  pub attendance:        AttendanceRecord,
  pub user_status:       Option<String>,
  pub work_location:     Option<String>,
  pub recorder:          Option<String>,
  pub home_support_eval: bool,
  pub external_eval:     bool,
  pub work_goal:         Option<String>,
  pub work_eval:         Option<String>,
  pub employment_eval:   Option<String>,
  pub work_motivation:   Option<String>,
  pub communication:     Option<String>,
  pub evaluation:        Option<String>,
  pub user_feedback:     Option<String>,
}

// ─── Log payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckIn {
  pub user_name:         String,
  /// Defaults to today.
  pub date:              Option<NaiveDate>,
  pub attendance_status: Option<String>,
  pub morning_task:      Option<String>,
  pub afternoon_task:    Option<String>,
  pub health_condition:  Option<String>,
  pub sleep_condition:   Option<String>,
  pub checkin_comment:   Option<String>,
  pub checkin_time:      Option<String>,
  /// Used when the master schedule has no entry for the weekday.
  pub scheduled_use:     Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckOut {
  pub user_name:        String,
  pub date:             Option<NaiveDate>,
  pub fatigue:          Option<String>,
  pub stress:           Option<String>,
  pub checkout_comment: Option<String>,
  pub checkout_time:    Option<String>,
  pub lunch_break:      Option<String>,
  pub short_break:      Option<String>,
  pub other_break:      Option<String>,
}

/// Partial attendance edit. `None` leaves a field untouched; an empty string
/// clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceUpdate {
  pub user_name:         String,
  pub date:              Option<NaiveDate>,
  pub scheduled_use:     Option<String>,
  pub attendance_status: Option<String>,
  pub checkin_time:      Option<String>,
  pub checkout_time:     Option<String>,
  pub lunch_break:       Option<String>,
  pub short_break:       Option<String>,
  pub other_break:       Option<String>,
}

impl AttendanceUpdate {
  /// Whether any input to the work-duration calculation is being changed.
  pub fn touches_duration(&self) -> bool {
    self.checkin_time.is_some()
      || self.checkout_time.is_some()
      || self.lunch_break.is_some()
      || self.short_break.is_some()
      || self.other_break.is_some()
  }
}

/// The manually entered block of a support-log row. The whole block is
/// written at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupportInput {
  pub user_name:         String,
  pub date:              Option<NaiveDate>,
  pub user_status:       Option<String>,
  pub work_location:     Option<String>,
  pub recorder:          Option<String>,
  pub home_support_eval: bool,
  pub external_eval:     bool,
  pub work_goal:         Option<String>,
  pub work_eval:         Option<String>,
  pub employment_eval:   Option<String>,
  pub work_motivation:   Option<String>,
  pub communication:     Option<String>,
  pub evaluation:        Option<String>,
  pub user_feedback:     Option<String>,
}

// ─── Users ───────────────────────────────────────────────────────────────────

/// A master-sheet user row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterUser {
  pub name:          String,
  pub furigana:      String,
  pub status:        String,
  pub scheduled_mon: String,
  pub scheduled_tue: String,
  pub scheduled_wed: String,
  pub scheduled_thu: String,
  pub scheduled_fri: String,
  pub scheduled_sat: String,
  pub scheduled_sun: String,
  pub row_number:    u32,
}

impl MasterUser {
  /// Scheduled-attendance labels, Monday first.
  pub fn schedule(&self) -> [&str; 7] {
    [
      &self.scheduled_mon,
      &self.scheduled_tue,
      &self.scheduled_wed,
      &self.scheduled_thu,
      &self.scheduled_fri,
      &self.scheduled_sat,
      &self.scheduled_sun,
    ]
  }

  pub fn scheduled_on(&self, day: Weekday) -> &str { self.schedule()[day.num_days_from_monday() as usize] }

  pub(crate) fn set_schedule(&mut self, labels: [String; 7]) {
    let [mon, tue, wed, thu, fri, sat, sun] = labels;
    self.scheduled_mon = mon;
    self.scheduled_tue = tue;
    self.scheduled_wed = wed;
    self.scheduled_thu = thu;
    self.scheduled_fri = fri;
    self.scheduled_sat = sat;
    self.scheduled_sun = sun;
  }
}

/// A master user merged with its roster profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(flatten)]
  pub user:              MasterUser,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub roster_row_number: Option<u32>,
  /// Roster fields keyed by their camelCase name.
  #[serde(flatten)]
  pub roster:            BTreeMap<&'static str, String>,
}

/// Create or update payload for a user. Any camelCase roster key present in
/// the body lands in `roster`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
  #[serde(default)]
  pub row_number:    Option<u32>,
  #[serde(default)]
  pub name:          String,
  #[serde(default)]
  pub furigana:      String,
  #[serde(default)]
  pub status:        String,
  #[serde(default)]
  pub scheduled_mon: String,
  #[serde(default)]
  pub scheduled_tue: String,
  #[serde(default)]
  pub scheduled_wed: String,
  #[serde(default)]
  pub scheduled_thu: String,
  #[serde(default)]
  pub scheduled_fri: String,
  #[serde(default)]
  pub scheduled_sat: String,
  #[serde(default)]
  pub scheduled_sun: String,
  #[serde(flatten)]
  pub roster:        serde_json::Map<String, serde_json::Value>,
}

impl UserInput {
  pub fn schedule(&self) -> [&str; 7] {
    [
      &self.scheduled_mon,
      &self.scheduled_tue,
      &self.scheduled_wed,
      &self.scheduled_thu,
      &self.scheduled_fri,
      &self.scheduled_sat,
      &self.scheduled_sun,
    ]
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
  pub row_number: u32,
  pub status:     String,
  #[serde(default)]
  pub leave_date: Option<String>,
}

// ─── Staff ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
  pub name:            String,
  pub role:            String,
  pub email:           String,
  pub job_type:        String,
  pub qualification:   String,
  pub placement:       String,
  pub employment_type: String,
  pub retirement_date: String,
  pub row_number:      u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaffInput {
  pub row_number:      Option<u32>,
  pub name:            String,
  pub role:            Option<String>,
  pub email:           String,
  pub password:        String,
  pub job_type:        String,
  pub qualification:   String,
  pub placement:       String,
  pub employment_type: String,
  pub retirement_date: String,
}

/// What login needs to know about a staff row.
#[derive(Debug, Clone)]
pub struct StaffCredential {
  pub name:     String,
  pub email:    String,
  pub role:     String,
  /// Plaintext or an argon2 PHC string.
  pub password: String,
  pub retired:  bool,
}
