//! Positional layout of the three sheets (schema version 4, merged log).
//!
//! Column numbers are the schema. Every column→field mapping lives here so
//! layout drift is visible in one place; nothing else in the crate hardcodes a
//! column index.

use strum::{EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

// ─── Sheet names ─────────────────────────────────────────────────────────────

pub const MASTER_SHEET: &str = "マスタ設定";

pub fn log_sheet_name(fiscal_year: i32) -> String { format!("支援記録_{fiscal_year}") }

pub fn roster_sheet_name(fiscal_year: i32) -> String { format!("名簿_{fiscal_year}") }

pub fn billing_sheet_name(fiscal_year: i32) -> String { format!("請求_{fiscal_year}") }

/// The fiscal year a per-year sheet belongs to, if `name` is one.
pub fn sheet_fiscal_year(name: &str) -> Option<i32> {
  let (prefix, year) = name.rsplit_once('_')?;
  if !matches!(prefix, "支援記録" | "名簿" | "請求") || year.len() != 4 {
    return None;
  }
  year.parse().ok()
}

// ─── Master: users ───────────────────────────────────────────────────────────

pub mod user {
  pub const FIRST_ROW: u32 = 8;
  pub const LAST_ROW: u32 = 200;
  pub const ROWS: u32 = LAST_ROW - FIRST_ROW + 1;

  pub const NAME: u32 = 1;
  pub const FURIGANA: u32 = 2;
  pub const STATUS: u32 = 3;
  /// Monday; Tuesday..Sunday follow in order.
  pub const SCHEDULE_MON: u32 = 4;
  pub const WIDTH: u32 = 10;
}

// ─── Master: staff ───────────────────────────────────────────────────────────

pub mod staff {
  pub const FIRST_ROW: u32 = 8;
  pub const LAST_ROW: u32 = 40;
  pub const ROWS: u32 = LAST_ROW - FIRST_ROW + 1;

  pub const NAME: u32 = 22;
  pub const ROLE: u32 = 23;
  pub const EMAIL: u32 = 24;
  pub const PASSWORD: u32 = 25;
  pub const JOB_TYPE: u32 = 26;
  pub const QUALIFICATION: u32 = 27;
  pub const PLACEMENT: u32 = 28;
  pub const EMPLOYMENT_TYPE: u32 = 29;
  pub const RETIREMENT_DATE: u32 = 30;
  pub const WIDTH: u32 = 9;
}

// ─── Master: dropdown regions ────────────────────────────────────────────────

/// How a dropdown region's cells are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
  Text,
  /// Time-of-day cells rendered as `HH:MM`.
  TimeList,
}

/// A read-only option list stored in one master column.
#[derive(Debug, Clone, Copy)]
pub struct DropdownRegion {
  pub key:       &'static str,
  pub col:       u32,
  pub first_row: u32,
  pub last_row:  u32,
  pub kind:      OptionKind,
}

const fn region(key: &'static str, col: u32, first_row: u32, last_row: u32) -> DropdownRegion {
  DropdownRegion { key, col, first_row, last_row, kind: OptionKind::Text }
}

const fn times(key: &'static str, col: u32, first_row: u32, last_row: u32) -> DropdownRegion {
  DropdownRegion { key, col, first_row, last_row, kind: OptionKind::TimeList }
}

pub const DROPDOWNS: &[DropdownRegion] = &[
  region("attendanceStatus", 11, 8, 29),
  region("workContent", 12, 8, 29),
  region("healthCondition", 14, 8, 17),
  region("sleepCondition", 15, 8, 17),
  region("fatigue", 14, 31, 40),
  region("stress", 15, 31, 40),
  times("checkinTime", 16, 8, 40),
  times("checkoutTime", 17, 8, 40),
  times("lunchBreak", 18, 8, 25),
  times("shortBreak", 19, 8, 25),
  times("otherBreak", 20, 8, 25),
  region("recorder", 22, 8, 25),
  region("workEvaluation", 31, 30, 40),
  region("employmentEvaluation", 32, 8, 25),
  region("workMotivation", 33, 8, 25),
  region("communication", 34, 8, 25),
  region("evaluation", 35, 8, 25),
  region("scheduledWeekly", 11, 44, 55),
  region("qualification", 20, 44, 55),
  region("placement", 21, 44, 55),
  region("jobType", 22, 44, 55),
  region("workLocation", 23, 44, 55),
  region("employmentType", 24, 44, 55),
  region("lifeProtection", 12, 44, 50),
  region("disabilityPension", 13, 44, 50),
  region("disabilityGrade", 14, 44, 50),
  region("disabilityType", 15, 44, 50),
  region("supportLevel", 16, 44, 50),
  region("contractType", 17, 44, 50),
  region("employmentSupport", 18, 44, 50),
  region("userStatus", 19, 44, 50),
];

// ─── Master: billing regions ─────────────────────────────────────────────────

pub mod billing {
  /// Billing option lists: one category per column, K..P.
  pub const DROPDOWN_FIRST_ROW: u32 = 61;
  pub const DROPDOWN_LAST_ROW: u32 = 90;
  pub const DROPDOWN_FIRST_COL: u32 = 11;
  pub const DROPDOWN_COLS: u32 = 6;

  /// Municipality name and code pairs, Q..R, packed from the top.
  pub const MUNICIPALITY_FIRST_ROW: u32 = 61;
  pub const MUNICIPALITY_ROWS: u32 = 50;
  pub const MUNICIPALITY_NAME: u32 = 17;
  pub const MUNICIPALITY_WIDTH: u32 = 2;

  /// Billing settings: one value per row in column B of the billing sheet.
  pub const SETTINGS_FIRST_ROW: u32 = 3;
  pub const SETTINGS_LAST_ROW: u32 = 51;
  pub const SETTINGS_ROWS: u32 = SETTINGS_LAST_ROW - SETTINGS_FIRST_ROW + 1;
  pub const SETTINGS_COL: u32 = 2;
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// First data row of the support log; row 1 holds headers.
pub const LOG_FIRST_ROW: u32 = 2;
pub const LOG_WIDTH: u32 = 38;

/// Columns of the merged support log. The discriminant is the column number.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogColumn {
  Date = 1,
  UserName,
  Scheduled,
  Attendance,
  MorningTask,
  AfternoonTask,
  Workplace,
  Health,
  Sleep,
  CheckinComment,
  Fatigue,
  Stress,
  CheckoutComment,
  Reserved1,
  Reserved2,
  CheckinTime,
  CheckoutTime,
  LunchBreak,
  ShortBreak,
  OtherBreak,
  WorkHours,
  MealService,
  AbsenceSupport,
  VisitSupport,
  Transport,
  UserStatus,
  WorkLocation,
  Recorder,
  Reserved3,
  HomeSupportEval,
  ExternalEval,
  WorkGoal,
  WorkEval,
  EmploymentEval,
  WorkMotivation,
  Communication,
  Evaluation,
  UserFeedback,
}

impl LogColumn {
  pub const fn col(self) -> u32 { self as u32 }

  /// Zero-based index into a row read from column 1.
  pub const fn idx(self) -> usize { self as usize - 1 }
}

// ─── Roster ──────────────────────────────────────────────────────────────────

pub const ROSTER_FIRST_ROW: u32 = 3;
pub const ROSTER_WIDTH: u32 = 60;

/// Roster columns. The discriminant is the column number; the strum name is
/// the camelCase JSON key used on the wire.
#[repr(u32)]
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum RosterField {
  Number = 1,
  Name,
  #[strum(serialize = "furigana")]
  NameKana,
  Age,
  Status,
  MobilePhone,
  ChatworkId,
  Mail,
  EmergencyContact1,
  EmergencyPhone1,
  EmergencyContact2,
  EmergencyPhone2,
  PostalCode,
  Prefecture,
  City,
  Ward,
  Address,
  Address2,
  BirthDate,
  LifeProtection,
  DisabilityPension,
  DisabilityNumber,
  DisabilityGrade,
  DisabilityType,
  HandbookValid,
  MunicipalNumber,
  CertificateNumber,
  DecisionPeriod1,
  DecisionPeriod2,
  ApplicableStart,
  ApplicableEnd,
  SupplyAmount,
  SupportLevel,
  UseStartDate,
  UsePeriod,
  InitialAddition,
  UserBurdenLimit,
  ConsultationFacility,
  ConsultationStaff,
  ConsultationContact,
  GhFacility,
  GhStaff,
  GhContact,
  OtherFacility,
  OtherStaff,
  OtherContact,
  BankName,
  BankCode,
  BranchName,
  BranchCode,
  AccountNumber,
  Reserved1,
  LeaveDate,
  LeaveReason,
  WorkName,
  WorkContact,
  WorkContent,
  ContractType,
  EmploymentSupport,
  Notes,
}

impl RosterField {
  pub const fn col(self) -> u32 { self as u32 }

  pub const fn idx(self) -> usize { self as usize - 1 }

  pub fn key(self) -> &'static str { self.into() }

  /// Columns maintained by sheet formulas or left for manual use; the
  /// application never writes them.
  pub fn is_computed(self) -> bool {
    matches!(
      self,
      Self::Number | Self::Age | Self::UsePeriod | Self::InitialAddition | Self::Reserved1
    )
  }

  /// Fields accepted from a write payload.
  pub fn writable() -> impl Iterator<Item = Self> { Self::iter().filter(|f| !f.is_computed()) }

  /// Fields reported alongside a master user record. Identity fields come
  /// from the master sheet instead.
  pub fn profile() -> impl Iterator<Item = Self> {
    Self::iter().filter(|f| {
      !matches!(
        f,
        Self::Number
          | Self::Name
          | Self::NameKana
          | Self::Age
          | Self::Status
          | Self::UsePeriod
          | Self::Reserved1
      )
    })
  }
}
