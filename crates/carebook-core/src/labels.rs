//! Japanese data labels stored in the sheets.
//!
//! Labels are free text typed by staff, so status-like enums are parsed
//! strictly only where the write path validates them. Reporting code
//! classifies by substring (see [`ScheduleCategory::classify`]).

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

/// Contract status of a user.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, IntoStaticStr,
  AsRefStr,
)]
pub enum UserStatus {
  #[default]
  #[serde(rename = "契約中")]
  #[strum(serialize = "契約中")]
  Active,
  #[serde(rename = "退所済み")]
  #[strum(serialize = "退所済み")]
  Departed,
}

/// Staff account role.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, IntoStaticStr,
  AsRefStr,
)]
pub enum StaffRole {
  #[serde(rename = "管理者")]
  #[strum(serialize = "管理者")]
  Admin,
  #[default]
  #[serde(rename = "従業員")]
  #[strum(serialize = "従業員")]
  Staff,
}

/// Attendance categories recorded in the log's attendance column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, AsRefStr, EnumIter)]
pub enum AttendanceCategory {
  #[strum(serialize = "出勤")]
  OnSite,
  #[strum(serialize = "在宅")]
  Home,
  #[strum(serialize = "施設外")]
  OffSite,
  #[strum(serialize = "遅刻")]
  Late,
  #[strum(serialize = "早退")]
  EarlyLeave,
  #[strum(serialize = "欠勤")]
  Absent,
}

impl AttendanceCategory {
  /// Exact-label lookup; unknown labels are `None`.
  pub fn parse(label: &str) -> Option<Self> { label.trim().parse().ok() }

  /// The five categories counted as attendance. Absence is not.
  pub fn is_present(self) -> bool { !matches!(self, Self::Absent) }
}

/// Weekly-schedule destination derived from a scheduled-attendance label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoStaticStr, EnumIter)]
pub enum ScheduleCategory {
  #[serde(rename = "本施設")]
  #[strum(serialize = "本施設")]
  OnSite,
  #[serde(rename = "施設外")]
  #[strum(serialize = "施設外")]
  OffSite,
  #[serde(rename = "在宅")]
  #[strum(serialize = "在宅")]
  Home,
}

/// Marker for a weekday the user does not attend.
pub const NOT_USING: &str = "非利用";

impl ScheduleCategory {
  /// Classify a scheduled-attendance label by substring. Blank labels and
  /// labels containing `非利用` are excluded. Order matters: the off-site
  /// test runs before the home test.
  pub fn classify(label: &str) -> Option<Self> {
    let label = label.trim();
    if label.is_empty() || label.contains(NOT_USING) {
      return None;
    }
    if label.contains("施設外") || label.contains('外') {
      Some(Self::OffSite)
    } else if label.contains("在宅") || label.contains("自宅") {
      Some(Self::Home)
    } else {
      Some(Self::OnSite)
    }
  }
}

/// Single-character Japanese weekday, Monday first.
pub fn weekday_label(day: Weekday) -> &'static str {
  match day {
    Weekday::Mon => "月",
    Weekday::Tue => "火",
    Weekday::Wed => "水",
    Weekday::Thu => "木",
    Weekday::Fri => "金",
    Weekday::Sat => "土",
    Weekday::Sun => "日",
  }
}
