//! Read-only summaries over the log, master and roster sheets.
//!
//! Every figure is a reduction over a bounded trailing window of the log:
//! `analytics_window_current` rows for the running month and
//! `analytics_window_past` for anything older. Rows outside the window are
//! not counted.
//!
//! Category rules are substring matches on the stored Japanese labels. They
//! define historical report numbers and must not drift.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  str::FromStr,
};

use chrono::{Datelike as _, Months, NaiveDate, Weekday};
use serde::Serialize;
use tracing::debug;

use crate::{
  Error, Facility, Result,
  cell::CellValue,
  codec,
  duration::hours_to_minutes,
  error::storage,
  grid::Sheet,
  labels::{AttendanceCategory, ScheduleCategory, UserStatus, weekday_label},
  scan::read_trailing,
  schema::{LogColumn as C, RosterField as R},
};

// ─── Periods ─────────────────────────────────────────────────────────────────

/// A calendar month, held as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Month(NaiveDate);

impl Month {
  pub fn of(date: NaiveDate) -> Self { Self(date.with_day(1).unwrap_or(date)) }

  pub fn year(self) -> i32 { self.0.year() }

  pub fn month(self) -> u32 { self.0.month() }

  pub fn first_day(self) -> NaiveDate { self.0 }

  pub fn last_day(self) -> NaiveDate { self.next().0.pred_opt().unwrap_or(self.0) }

  pub fn next(self) -> Self { Self(self.0.checked_add_months(Months::new(1)).unwrap_or(self.0)) }

  pub fn prev(self) -> Self { Self(self.0.checked_sub_months(Months::new(1)).unwrap_or(self.0)) }

  pub fn contains(self, date: NaiveDate) -> bool { Self::of(date) == self }
}

impl FromStr for Month {
  type Err = Error;

  /// `YYYY-MM`.
  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    let invalid = || Error::validation(format!("月の形式が正しくありません: {s}"));
    if s.len() != 7 {
      return Err(invalid());
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
      .map(Self)
      .map_err(|_| invalid())
  }
}

impl fmt::Display for Month {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0.format("%Y-%m")) }
}

/// The fiscal year (April to March) containing `date`.
pub fn fiscal_year_of(date: NaiveDate) -> i32 {
  if date.month() >= 4 { date.year() } else { date.year() - 1 }
}

/// The twelve months of a fiscal year, April first.
pub fn fiscal_months(fiscal_year: i32) -> Vec<Month> {
  let Some(april) = NaiveDate::from_ymd_opt(fiscal_year, 4, 1) else {
    return Vec::new();
  };
  (0..12).map(|i| Month(april + Months::new(i))).collect()
}

fn ratio(num: usize, den: usize) -> f64 { if den == 0 { 0.0 } else { num as f64 / den as f64 } }

fn round1(v: f64) -> f64 { (v * 10.0).round() / 10.0 }

// ─── Log reduction ───────────────────────────────────────────────────────────

/// The analytic projection of one log row.
#[derive(Debug, Clone)]
struct LogFact {
  date:       NaiveDate,
  user_name:  String,
  scheduled:  bool,
  status:     String,
  work_hours: Option<f64>,
}

impl LogFact {
  fn from_row(row: &[CellValue]) -> Option<Self> {
    let date = codec::parse_date(&row[C::Date.idx()])?;
    let user_name = codec::text(&row[C::UserName.idx()]);
    if user_name.is_empty() {
      return None;
    }
    Some(Self {
      date,
      user_name,
      scheduled: !row[C::Scheduled.idx()].is_blank(),
      status: codec::text(&row[C::Attendance.idx()]),
      work_hours: codec::opt_hours(&row[C::WorkHours.idx()]),
    })
  }

  fn category(&self) -> Option<AttendanceCategory> { AttendanceCategory::parse(&self.status) }
}

/// Counts for one period.
#[derive(Debug, Default)]
struct Tally {
  scheduled:     usize,
  attendance:    usize,
  work_days:     BTreeSet<NaiveDate>,
  facility_home: usize,
  external:      usize,
}

impl Tally {
  fn add(&mut self, fact: &LogFact) {
    if fact.scheduled {
      self.scheduled += 1;
    }
    if !fact.status.is_empty() {
      self.work_days.insert(fact.date);
    }
    match fact.category() {
      Some(c) if c.is_present() => {
        self.attendance += 1;
        if c == AttendanceCategory::OffSite {
          self.external += 1;
        } else {
          self.facility_home += 1;
        }
      }
      _ => {}
    }
  }

  fn rate(&self) -> f64 { ratio(self.attendance, self.scheduled) }

  fn avg_users_per_day(&self) -> f64 { ratio(self.attendance, self.work_days.len()) }
}

// ─── Roster projection ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct RosterPerson {
  pub(crate) name:         String,
  pub(crate) furigana:     String,
  pub(crate) status:       String,
  pub(crate) use_start:    Option<NaiveDate>,
  pub(crate) leave_date:   Option<NaiveDate>,
  pub(crate) leave_reason: String,
}

impl RosterPerson {
  fn from_row(row: &[CellValue]) -> Option<Self> {
    let get = |f: R| &row[f.idx()];
    let name = codec::text(get(R::Name));
    if name.is_empty() {
      return None;
    }
    Some(Self {
      name,
      furigana: codec::text(get(R::NameKana)),
      status: codec::text(get(R::Status)),
      use_start: codec::parse_date(get(R::UseStartDate)),
      leave_date: codec::parse_date(get(R::LeaveDate)),
      leave_reason: codec::text(get(R::LeaveReason)),
    })
  }

  fn departed_within(&self, from: NaiveDate, to: NaiveDate) -> bool {
    self.status == <&str>::from(UserStatus::Departed)
      && self.leave_date.is_some_and(|d| d >= from && d <= to)
  }
}

/// Who was enrolled during a month, in roster order.
#[derive(Debug, Default)]
struct Enrollment {
  contracted:     Vec<String>,
  later_departed: Vec<String>,
  departed:       Vec<DepartedUser>,
}

impl Enrollment {
  fn for_month(people: &[RosterPerson], month: Month) -> Self {
    let (first, last) = (month.first_day(), month.last_day());
    let mut out = Self::default();
    for p in people {
      if p.use_start.is_some_and(|d| d > last) {
        continue;
      }
      if p.status == <&str>::from(UserStatus::Active) {
        out.contracted.push(p.name.clone());
      } else if p.status == <&str>::from(UserStatus::Departed) {
        match p.leave_date {
          Some(d) if d >= first && d <= last => out.departed.push(DepartedUser::from(p)),
          Some(d) if d > last => out.later_departed.push(p.name.clone()),
          _ => {}
        }
      }
    }
    out.departed.sort_by(|a, b| b.leave_date.cmp(&a.leave_date));
    out
  }

  fn total(&self) -> usize { self.contracted.len() + self.later_departed.len() + self.departed.len() }

  /// Names for display; users who left during the month are marked.
  fn names(&self) -> Vec<String> {
    self
      .contracted
      .iter()
      .chain(&self.later_departed)
      .cloned()
      .chain(self.departed.iter().map(|d| format!("{}（退所）", d.name)))
      .collect()
  }
}

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityStats {
  pub year:                   i32,
  pub month:                  u32,
  pub total_users:            usize,
  pub active_users_list:      Vec<String>,
  pub scheduled:              usize,
  pub monthly_attendance:     usize,
  pub attendance_rate:        f64,
  pub monthly_work_days:      usize,
  pub avg_users_per_day:      f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prev_avg_users_per_day: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avg_users_change:       Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
  pub weekday:  &'static str,
  pub on_site:  usize,
  pub off_site: usize,
  pub home:     usize,
  /// Raw label counts behind the three totals.
  pub details:  BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySchedule {
  pub schedule: Vec<DaySchedule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
  pub user_name:          String,
  pub year:               i32,
  pub month:              u32,
  pub attendance_days:    usize,
  pub absent_days:        usize,
  pub scheduled:          usize,
  pub attendance_rate:    f64,
  pub total_work_minutes: i64,
  pub avg_work_minutes:   i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartedUser {
  pub name:         String,
  pub furigana:     String,
  pub leave_date:   String,
  pub leave_reason: String,
}

impl From<&RosterPerson> for DepartedUser {
  fn from(p: &RosterPerson) -> Self {
    Self {
      name:         p.name.clone(),
      furigana:     p.furigana.clone(),
      leave_date:   p.leave_date.map(codec::format_date).unwrap_or_default(),
      leave_reason: p.leave_reason.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartedUsers {
  pub year:  i32,
  pub month: u32,
  pub users: Vec<DepartedUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
  pub month:           String,
  pub attendance:      usize,
  pub scheduled:       usize,
  pub work_days:       usize,
  pub attendance_rate: f64,
  /// On-site and home attendance.
  pub facility_home:   usize,
  pub external:        usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
  pub facility_home: usize,
  pub external:      usize,
}

impl Placement {
  fn add(&mut self, on_site: bool) {
    if on_site {
      self.facility_home += 1;
    } else {
      self.external += 1;
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentBreakdown {
  pub full_time:       Placement,
  pub part_time_less2: Placement,
  pub part_time_more3: Placement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSupportStaff {
  pub facility_home:      usize,
  pub external:           usize,
  pub by_employment_type: EmploymentBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelfareQualification {
  /// Full-time direct-support staff.
  pub total:              usize,
  pub with_qualification: usize,
  /// Whole percent.
  pub rate:               u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStats {
  pub fiscal_year:           i32,
  pub fiscal_year_label:     String,
  pub yearly_attendance:     usize,
  pub yearly_scheduled:      usize,
  pub yearly_work_days:      usize,
  pub attendance_rate:       f64,
  pub yearly_departed:       usize,
  pub monthly_summary:       Vec<MonthSummary>,
  pub direct_support_staff:  DirectSupportStaff,
  pub welfare_qualification: WelfareQualification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsBatch {
  pub facility_stats:  FacilityStats,
  pub departed_users:  Vec<DepartedUser>,
  pub weekly_schedule: WeeklySchedule,
}

const DIRECT_SUPPORT_JOBS: [&str; 2] = ["生活支援員", "職業指導員"];

const WEEK: [Weekday; 7] = [
  Weekday::Mon,
  Weekday::Tue,
  Weekday::Wed,
  Weekday::Thu,
  Weekday::Fri,
  Weekday::Sat,
  Weekday::Sun,
];

// ─── Aggregator ──────────────────────────────────────────────────────────────

impl<S: Sheet> Facility<S> {
  fn window_for(&self, month: Month, today: NaiveDate) -> u32 {
    if month == Month::of(today) {
      self.scan.analytics_window_current
    } else {
      self.scan.analytics_window_past
    }
  }

  async fn log_facts(&self, window: u32) -> Result<Vec<LogFact>> {
    let Some((start, rows)) = read_trailing(&self.log, window, C::WorkHours.col(), &self.scan)
      .await
      .map_err(storage)?
    else {
      return Ok(Vec::new());
    };
    debug!(start, rows = rows.len(), "analytics window");
    Ok(rows.iter().filter_map(|r| LogFact::from_row(r)).collect())
  }

  pub(crate) async fn roster_people(&self) -> Result<Vec<RosterPerson>> {
    let rows = self.roster_rows().await?;
    Ok(rows.iter().filter_map(|(_, r)| RosterPerson::from_row(r)).collect())
  }

  async fn month_tally(&self, month: Month, window: u32) -> Result<Tally> {
    let mut tally = Tally::default();
    for fact in self.log_facts(window).await? {
      if month.contains(fact.date) {
        tally.add(&fact);
      }
    }
    Ok(tally)
  }

  /// `analytics/facility-stats[/{month}]`.
  pub async fn facility_stats(&self, month: Month, today: NaiveDate) -> Result<FacilityStats> {
    let enrollment = Enrollment::for_month(&self.roster_people().await?, month);
    let tally = self.month_tally(month, self.window_for(month, today)).await?;
    Ok(FacilityStats {
      year:                   month.year(),
      month:                  month.month(),
      total_users:            enrollment.total(),
      active_users_list:      enrollment.names(),
      scheduled:              tally.scheduled,
      monthly_attendance:     tally.attendance,
      attendance_rate:        tally.rate(),
      monthly_work_days:      tally.work_days.len(),
      avg_users_per_day:      round1(tally.avg_users_per_day()),
      prev_avg_users_per_day: None,
      avg_users_change:       None,
    })
  }

  /// `analytics/weekly-schedule`: active users' weekday labels by category.
  pub async fn weekly_schedule(&self) -> Result<WeeklySchedule> {
    let users = self.active_users().await?;
    let schedule = WEEK
      .into_iter()
      .map(|day| {
        let mut out = DaySchedule {
          weekday:  weekday_label(day),
          on_site:  0,
          off_site: 0,
          home:     0,
          details:  BTreeMap::new(),
        };
        for u in &users {
          let label = u.scheduled_on(day).trim();
          let Some(category) = ScheduleCategory::classify(label) else { continue };
          match category {
            ScheduleCategory::OnSite => out.on_site += 1,
            ScheduleCategory::OffSite => out.off_site += 1,
            ScheduleCategory::Home => out.home += 1,
          }
          *out.details.entry(label.to_string()).or_default() += 1;
        }
        out
      })
      .collect();
    Ok(WeeklySchedule { schedule })
  }

  /// `analytics/user-stats/{name}`: the running month for one user.
  pub async fn user_stats(&self, name: &str, today: NaiveDate) -> Result<UserStats> {
    let name = name.trim();
    let month = Month::of(today);
    let (mut attended, mut absent, mut scheduled, mut minutes) = (0, 0, 0, 0);
    for fact in self.log_facts(self.scan.analytics_window_current).await? {
      if fact.user_name != name || !month.contains(fact.date) {
        continue;
      }
      if fact.scheduled {
        scheduled += 1;
      }
      match fact.category() {
        Some(AttendanceCategory::OnSite | AttendanceCategory::Late) => {
          attended += 1;
          minutes += fact.work_hours.map(hours_to_minutes).unwrap_or(0);
        }
        Some(AttendanceCategory::Absent) => absent += 1,
        _ => {}
      }
    }
    Ok(UserStats {
      user_name: name.to_string(),
      year: month.year(),
      month: month.month(),
      attendance_days: attended,
      absent_days: absent,
      scheduled,
      attendance_rate: ratio(attended, scheduled),
      total_work_minutes: minutes,
      avg_work_minutes: if attended == 0 { 0 } else { (minutes as f64 / attended as f64).round() as i64 },
    })
  }

  /// `analytics/departed-users[/{month}]`: newest departure first.
  pub async fn departed_users(&self, month: Month) -> Result<DepartedUsers> {
    let people = self.roster_people().await?;
    let mut users: Vec<DepartedUser> = people
      .iter()
      .filter(|p| p.departed_within(month.first_day(), month.last_day()))
      .map(DepartedUser::from)
      .collect();
    users.sort_by(|a, b| b.leave_date.cmp(&a.leave_date));
    Ok(DepartedUsers { year: month.year(), month: month.month(), users })
  }

  /// `analytics/yearly-stats[/{fiscalYear}]`.
  pub async fn yearly_stats(&self, fiscal_year: i32) -> Result<YearlyStats> {
    let months = fiscal_months(fiscal_year);
    let (Some(&first), Some(&last)) = (months.first(), months.last()) else {
      return Err(Error::validation(format!("年度が正しくありません: {fiscal_year}")));
    };
    let (from, to) = (first.first_day(), last.last_day());

    let mut yearly = Tally::default();
    let mut monthly: BTreeMap<Month, Tally> = months.iter().map(|m| (*m, Tally::default())).collect();
    for fact in self.log_facts(self.scan.analytics_window_past).await? {
      if fact.date < from || fact.date > to {
        continue;
      }
      yearly.add(&fact);
      if let Some(t) = monthly.get_mut(&Month::of(fact.date)) {
        t.add(&fact);
      }
    }

    let yearly_departed = self
      .roster_people()
      .await?
      .iter()
      .filter(|p| p.departed_within(from, to))
      .count();

    let (direct_support_staff, welfare_qualification) = self.direct_support_staff().await?;

    Ok(YearlyStats {
      fiscal_year,
      fiscal_year_label: format!("{fiscal_year}年度"),
      yearly_attendance: yearly.attendance,
      yearly_scheduled: yearly.scheduled,
      yearly_work_days: yearly.work_days.len(),
      attendance_rate: yearly.rate(),
      yearly_departed,
      monthly_summary: monthly
        .iter()
        .map(|(m, t)| MonthSummary {
          month:           m.to_string(),
          attendance:      t.attendance,
          scheduled:       t.scheduled,
          work_days:       t.work_days.len(),
          attendance_rate: t.rate(),
          facility_home:   t.facility_home,
          external:        t.external,
        })
        .collect(),
      direct_support_staff,
      welfare_qualification,
    })
  }

  /// Serving direct-support staff by employment type and placement.
  ///
  /// Part-time labels are tested before full-time because `非常勤` contains
  /// `常勤`. Staff with an unrecognised employment type are not counted.
  async fn direct_support_staff(&self) -> Result<(DirectSupportStaff, WelfareQualification)> {
    let mut by_type = EmploymentBreakdown::default();
    let mut welfare = WelfareQualification::default();
    for s in self.list_staff().await? {
      if !s.retirement_date.trim().is_empty() || !DIRECT_SUPPORT_JOBS.contains(&s.job_type.trim()) {
        continue;
      }
      let on_site = s.placement.contains("本施設");
      let kind = s.employment_type.as_str();
      if kind.contains("週2以下") || kind.contains("2日以下") {
        by_type.part_time_less2.add(on_site);
      } else if kind.contains("週3以上") || kind.contains("3日以上") {
        by_type.part_time_more3.add(on_site);
      } else if kind.contains("常勤") && !kind.contains("非常勤") {
        by_type.full_time.add(on_site);
        welfare.total += 1;
        if !s.qualification.trim().is_empty() {
          welfare.with_qualification += 1;
        }
      }
    }
    welfare.rate = (ratio(welfare.with_qualification, welfare.total) * 100.0).round() as u32;
    let all = [by_type.full_time, by_type.part_time_less2, by_type.part_time_more3];
    Ok((
      DirectSupportStaff {
        facility_home:      all.iter().map(|p| p.facility_home).sum(),
        external:           all.iter().map(|p| p.external).sum(),
        by_employment_type: by_type,
      },
      welfare,
    ))
  }

  /// `analytics/batch[/{month}]`: facility stats with the month-on-month
  /// change in average daily users, the month's departures and the weekly
  /// schedule.
  pub async fn analytics_batch(&self, month: Month, today: NaiveDate) -> Result<AnalyticsBatch> {
    let enrollment = Enrollment::for_month(&self.roster_people().await?, month);
    let prev_month = month.prev();
    let window = self.window_for(month, today).saturating_add(self.window_for(prev_month, today));

    let (mut current, mut prev) = (Tally::default(), Tally::default());
    for fact in self.log_facts(window).await? {
      if month.contains(fact.date) {
        current.add(&fact);
      } else if prev_month.contains(fact.date) {
        prev.add(&fact);
      }
    }
    let avg = current.avg_users_per_day();
    let prev_avg = prev.avg_users_per_day();

    let facility_stats = FacilityStats {
      year:                   month.year(),
      month:                  month.month(),
      total_users:            enrollment.total(),
      active_users_list:      enrollment.names(),
      scheduled:              current.scheduled,
      monthly_attendance:     current.attendance,
      attendance_rate:        current.rate(),
      monthly_work_days:      current.work_days.len(),
      avg_users_per_day:      round1(avg),
      prev_avg_users_per_day: Some(round1(prev_avg)),
      avg_users_change:       Some(round1(avg - prev_avg)),
    };
    Ok(AnalyticsBatch {
      facility_stats,
      departed_users: enrollment.departed,
      weekly_schedule: self.weekly_schedule().await?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facility::testing::{date, facility, seed_staff, seed_user};

  async fn seed_log<Sh: Sheet>(sheet: &Sh, rows: &[(&str, &str, &str, &str, f64)])
  where
    Sh::Error: fmt::Debug,
  {
    for (i, (day, name, scheduled, status, hours)) in rows.iter().enumerate() {
      let mut cells = vec![
        CellValue::date(date(day)),
        CellValue::text(*name),
        CellValue::text(*scheduled),
        CellValue::text(*status),
      ];
      cells.resize(C::WorkHours.col() as usize, CellValue::Empty);
      if *hours > 0.0 {
        cells[C::WorkHours.idx()] = CellValue::Number(*hours);
      }
      sheet.write_row(2 + i as u32, 1, cells).await.unwrap();
    }
  }

  async fn seed_roster<Sh: Sheet>(sheet: &Sh, row: u32, fields: &[(R, &str)])
  where
    Sh::Error: fmt::Debug,
  {
    for (field, value) in fields {
      sheet.write(row, field.col(), CellValue::text(*value)).await.unwrap();
    }
  }

  #[test]
  fn month_parsing_and_bounds() {
    let m: Month = "2025-02".parse().unwrap();
    assert_eq!(m.last_day(), date("2025-02-28"));
    assert_eq!(m.prev().to_string(), "2025-01");
    assert_eq!(Month::of(date("2025-01-31")).next().to_string(), "2025-02");
    assert!("2025-2".parse::<Month>().is_err());
    assert!("2025-13".parse::<Month>().is_err());
    assert_eq!(fiscal_year_of(date("2025-03-31")), 2024);
    assert_eq!(fiscal_year_of(date("2025-04-01")), 2025);
    let months = fiscal_months(2024);
    assert_eq!(months.len(), 12);
    assert_eq!(months[11].to_string(), "2025-03");
  }

  #[tokio::test]
  async fn facility_stats_counts_and_rate() {
    let f = facility();
    seed_log(&f.log, &[
      ("2025-01-06", "a", "通所", "出勤", 6.0),
      ("2025-01-06", "b", "在宅", "在宅", 5.0),
      ("2025-01-06", "c", "通所", "欠勤", 0.0),
      ("2025-01-07", "a", "通所", "遅刻", 4.0),
      ("2025-01-07", "b", "", "施設外", 0.0),
      ("2025-01-08", "a", "通所", "", 0.0),
      ("2024-12-27", "a", "通所", "出勤", 6.0),
    ])
    .await;

    let stats = f.facility_stats("2025-01".parse().unwrap(), date("2025-01-20")).await.unwrap();
    assert_eq!(stats.scheduled, 5);
    assert_eq!(stats.monthly_attendance, 4);
    assert_eq!(stats.attendance_rate, 0.8);
    assert_eq!(stats.monthly_work_days, 2);
    assert_eq!(stats.avg_users_per_day, 2.0);
  }

  #[tokio::test]
  async fn empty_month_has_zero_rate() {
    let f = facility();
    let stats = f.facility_stats("2025-01".parse().unwrap(), date("2025-01-20")).await.unwrap();
    assert_eq!(stats.attendance_rate, 0.0);
    assert_eq!(stats.monthly_work_days, 0);
  }

  #[tokio::test]
  async fn enrollment_and_departures() {
    let f = facility();
    seed_roster(&f.roster, 3, &[(R::Name, "在籍"), (R::Status, "契約中")]).await;
    seed_roster(&f.roster, 4, &[(R::Name, "一月退所"), (R::Status, "退所済み"), (R::LeaveDate, "2025/01/10"), (R::LeaveReason, "就職")]).await;
    seed_roster(&f.roster, 5, &[(R::Name, "後日退所"), (R::Status, "退所済み"), (R::LeaveDate, "20250305")]).await;
    seed_roster(&f.roster, 6, &[(R::Name, "月末退所"), (R::Status, "退所済み"), (R::LeaveDate, "2025-01-31")]).await;
    seed_roster(&f.roster, 7, &[(R::Name, "未来"), (R::Status, "契約中"), (R::UseStartDate, "2025-02-01")]).await;
    seed_roster(&f.roster, 8, &[(R::Name, "昔"), (R::Status, "退所済み"), (R::LeaveDate, "2024-12-01")]).await;

    let jan: Month = "2025-01".parse().unwrap();
    let stats = f.facility_stats(jan, date("2025-01-20")).await.unwrap();
    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.active_users_list, vec!["在籍", "後日退所", "月末退所（退所）", "一月退所（退所）"]);

    let departed = f.departed_users(jan).await.unwrap();
    let names: Vec<_> = departed.users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["月末退所", "一月退所"]);
    assert_eq!(departed.users[1].leave_date, "2025-01-10");
    assert_eq!(departed.users[1].leave_reason, "就職");
  }

  #[tokio::test]
  async fn weekly_schedule_classifies_labels() {
    let f = facility();
    seed_user(&f, 8, "a", "契約中", ["通所", "施設外就労", "在宅", "自宅", "非利用日", "", "通所"]).await;
    seed_user(&f, 9, "b", "契約中", ["通所", "通所", "通所", "通所", "通所", "", ""]).await;
    seed_user(&f, 10, "c", "退所済み", ["通所"; 7]).await;

    let week = f.weekly_schedule().await.unwrap().schedule;
    assert_eq!(week.len(), 7);
    assert_eq!(week[0].weekday, "月");
    assert_eq!(week[0].on_site, 2);
    assert_eq!((week[1].on_site, week[1].off_site), (1, 1));
    assert_eq!(week[1].details["施設外就労"], 1);
    assert_eq!(week[3].home, 1);
    assert_eq!((week[4].on_site, week[4].off_site, week[4].home), (1, 0, 0));
    assert_eq!(week[5].details.len(), 0);
  }

  #[tokio::test]
  async fn user_stats_for_running_month() {
    let f = facility();
    seed_log(&f.log, &[
      ("2025-01-06", "a", "通所", "出勤", 6.0),
      ("2025-01-07", "a", "通所", "遅刻", 4.5),
      ("2025-01-08", "a", "通所", "欠勤", 0.0),
      ("2025-01-09", "a", "通所", "在宅", 3.0),
      ("2025-01-09", "b", "通所", "出勤", 7.0),
    ])
    .await;
    let stats = f.user_stats("a", date("2025-01-20")).await.unwrap();
    assert_eq!(stats.attendance_days, 2);
    assert_eq!(stats.absent_days, 1);
    assert_eq!(stats.scheduled, 4);
    assert_eq!(stats.attendance_rate, 0.5);
    assert_eq!(stats.total_work_minutes, 630);
    assert_eq!(stats.avg_work_minutes, 315);
  }

  #[tokio::test]
  async fn yearly_stats_with_staff() {
    let f = facility();
    seed_log(&f.log, &[
      ("2024-03-29", "a", "通所", "出勤", 0.0),
      ("2024-04-01", "a", "通所", "出勤", 0.0),
      ("2024-04-01", "b", "通所", "施設外", 0.0),
      ("2025-03-31", "a", "通所", "欠勤", 0.0),
      ("2025-04-01", "a", "通所", "出勤", 0.0),
    ])
    .await;
    seed_roster(&f.roster, 3, &[(R::Name, "x"), (R::Status, "退所済み"), (R::LeaveDate, "2024-10-01")]).await;
    seed_staff(&f, 8, ["A", "従業員", "a@x", "pw", "生活支援員", "社会福祉士", "本施設", "常勤", ""]).await;
    seed_staff(&f, 9, ["B", "従業員", "b@x", "pw", "職業指導員", "", "施設外", "常勤", ""]).await;
    seed_staff(&f, 10, ["C", "従業員", "c@x", "pw", "生活支援員", "", "本施設", "非常勤（週3以上）", ""]).await;
    seed_staff(&f, 11, ["D", "従業員", "d@x", "pw", "生活支援員", "", "本施設", "非常勤（2日以下）", ""]).await;
    seed_staff(&f, 12, ["E", "従業員", "e@x", "pw", "生活支援員", "", "本施設", "常勤", "2024-12-31"]).await;
    seed_staff(&f, 13, ["F", "管理者", "f@x", "pw", "サービス管理責任者", "", "本施設", "常勤", ""]).await;

    let stats = f.yearly_stats(2024).await.unwrap();
    assert_eq!(stats.fiscal_year_label, "2024年度");
    assert_eq!(stats.yearly_scheduled, 3);
    assert_eq!(stats.yearly_attendance, 2);
    assert_eq!(stats.yearly_work_days, 2);
    assert_eq!(stats.yearly_departed, 1);
    assert_eq!(stats.monthly_summary.len(), 12);
    let april = &stats.monthly_summary[0];
    assert_eq!(april.month, "2024-04");
    assert_eq!((april.attendance, april.facility_home, april.external), (2, 1, 1));
    assert_eq!(april.attendance_rate, 1.0);
    assert_eq!(stats.monthly_summary[11].scheduled, 1);

    let staff = &stats.direct_support_staff;
    assert_eq!((staff.facility_home, staff.external), (3, 1));
    assert_eq!(staff.by_employment_type.full_time, Placement { facility_home: 1, external: 1 });
    assert_eq!(staff.by_employment_type.part_time_more3.facility_home, 1);
    assert_eq!(staff.by_employment_type.part_time_less2.facility_home, 1);
    assert_eq!(stats.welfare_qualification, WelfareQualification { total: 2, with_qualification: 1, rate: 50 });
  }

  #[tokio::test]
  async fn batch_compares_with_previous_month() {
    let f = facility();
    seed_log(&f.log, &[
      ("2024-12-02", "a", "通所", "出勤", 0.0),
      ("2024-12-03", "a", "通所", "出勤", 0.0),
      ("2025-01-06", "a", "通所", "出勤", 0.0),
      ("2025-01-06", "b", "通所", "出勤", 0.0),
      ("2025-01-06", "c", "通所", "在宅", 0.0),
    ])
    .await;
    let batch = f.analytics_batch("2025-01".parse().unwrap(), date("2025-01-20")).await.unwrap();
    assert_eq!(batch.facility_stats.avg_users_per_day, 3.0);
    assert_eq!(batch.facility_stats.prev_avg_users_per_day, Some(1.0));
    assert_eq!(batch.facility_stats.avg_users_change, Some(2.0));
    assert_eq!(batch.weekly_schedule.schedule.len(), 7);
    assert!(batch.departed_users.is_empty());
  }

  #[tokio::test]
  async fn oversized_windows_saturate() {
    let f = facility().with_scan_config(crate::scan::ScanConfig {
      analytics_window_current: u32::MAX,
      analytics_window_past: u32::MAX,
      ..Default::default()
    });
    seed_log(&f.log, &[("2025-01-06", "a", "通所", "出勤", 0.0)]).await;
    let batch = f.analytics_batch("2025-01".parse().unwrap(), date("2025-01-20")).await.unwrap();
    assert_eq!(batch.facility_stats.monthly_attendance, 1);
  }
}
