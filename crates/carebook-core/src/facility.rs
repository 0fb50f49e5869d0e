//! [`Facility`]: the service that owns the facility's sheets.
//!
//! Operations are split by concern across `master`, `staff`, `sync`,
//! `attendance`, `support`, `analytics` and `billing`; each adds an `impl`
//! block here.

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{grid::Sheet, scan::ScanConfig};

/// What user sync does when a roster row cannot be found by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
  /// Log a warning and leave the roster untouched; the master write stands.
  #[default]
  BestEffort,
  /// Fail with not-found and roll the master write back.
  Strict,
}

/// A facility's record store over the master, log and roster sheets of the
/// same backend, plus an optional billing sheet.
///
/// Writes to a sheet happen under that sheet's lock, so a locate-then-write
/// sequence cannot interleave with another writer. Operations touching more
/// than one sheet take the locks in the order master → log → roster.
#[derive(Debug)]
pub struct Facility<S: Sheet> {
  pub(crate) master:       S,
  pub(crate) log:          S,
  pub(crate) roster:       S,
  pub(crate) billing:      Option<S>,
  pub(crate) fiscal_year:  Option<i32>,
  pub(crate) scan:         ScanConfig,
  pub(crate) sync_policy:  SyncPolicy,
  pub(crate) master_lock:  Mutex<()>,
  pub(crate) log_lock:     Mutex<()>,
  pub(crate) roster_lock:  Mutex<()>,
  pub(crate) billing_lock: Mutex<()>,
}

impl<S: Sheet> Facility<S> {
  pub fn new(master: S, log: S, roster: S) -> Self {
    Self {
      master,
      log,
      roster,
      billing: None,
      fiscal_year: None,
      scan: ScanConfig::default(),
      sync_policy: SyncPolicy::default(),
      master_lock: Mutex::new(()),
      log_lock: Mutex::new(()),
      roster_lock: Mutex::new(()),
      billing_lock: Mutex::new(()),
    }
  }

  /// Attach the fiscal year's billing sheet. Without one, billing settings
  /// operations fail with a missing-sheet error.
  pub fn with_billing(mut self, sheet: S) -> Self {
    self.billing = Some(sheet);
    self
  }

  /// Record which fiscal year the log and roster sheets belong to.
  pub fn with_fiscal_year(mut self, fiscal_year: i32) -> Self {
    self.fiscal_year = Some(fiscal_year);
    self
  }

  pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
    self.scan = scan;
    self
  }

  pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
    self.sync_policy = policy;
    self
  }

  pub fn scan_config(&self) -> &ScanConfig { &self.scan }

  pub fn sync_policy(&self) -> SyncPolicy { self.sync_policy }

  pub fn fiscal_year(&self) -> Option<i32> { self.fiscal_year }
}

#[cfg(test)]
pub(crate) mod testing {
  use chrono::NaiveDate;

  use super::*;
  use crate::{
    cell::CellValue,
    grid::MemorySheet,
    schema::{staff, user},
  };

  pub fn facility() -> Facility<MemorySheet> {
    Facility::new(MemorySheet::new(), MemorySheet::new(), MemorySheet::new())
  }

  /// A facility bound to fiscal year 2025 with a billing sheet.
  pub fn billed_facility() -> Facility<MemorySheet> {
    facility().with_fiscal_year(2025).with_billing(MemorySheet::new())
  }

  pub fn date(s: &str) -> NaiveDate {
    crate::codec::parse_date_str(s).unwrap()
  }

  /// Put a user row directly into the master sheet.
  pub async fn seed_user(f: &Facility<MemorySheet>, row: u32, name: &str, status: &str, schedule: [&str; 7]) {
    let mut cells = vec![CellValue::text(name), CellValue::text(format!("{name}カナ")), CellValue::text(status)];
    cells.extend(schedule.iter().map(|s| CellValue::text(*s)));
    assert_eq!(cells.len() as u32, user::WIDTH);
    f.master.write_row(row, user::NAME, cells).await.unwrap();
  }

  /// Put a staff row directly into the master sheet.
  pub async fn seed_staff(f: &Facility<MemorySheet>, row: u32, fields: [&str; 9]) {
    let cells = fields.iter().map(|s| CellValue::text(*s)).collect();
    f.master.write_row(row, staff::NAME, cells).await.unwrap();
  }
}
