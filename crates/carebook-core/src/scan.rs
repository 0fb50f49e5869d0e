//! Row-location heuristics over positional tables.
//!
//! Sheets have no index and may carry stale trailing rows (formula-only rows
//! that count as physical content). Three primitives cope with that:
//!
//! - [`find_insert_row`]: first blank identity cell, else append.
//! - [`find_actual_last_row`]: last row of real data inside a trailing window.
//! - [`locate`]: (date, name) lookup, fast (recent window) or exhaustive.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
  cell::CellValue,
  codec,
  grid::{Sheet, read_column},
  schema::{LOG_FIRST_ROW, LogColumn},
};

// ─── Tunables ────────────────────────────────────────────────────────────────

pub const TRAILING_WINDOW: u32 = 500;
pub const BLANK_RUN_LIMIT: u32 = 5;
pub const RECENT_WINDOW: u32 = 100;
pub const INSERT_SCAN_ROWS: u32 = 200;
pub const HISTORY_WINDOW: u32 = 500;
pub const HISTORY_LIMIT: usize = 50;
pub const HEALTH_WINDOW: u32 = 150;
pub const HEALTH_LIMIT: usize = 7;
pub const ANALYTICS_WINDOW_CURRENT: u32 = 1000;
pub const ANALYTICS_WINDOW_PAST: u32 = 3000;

/// Window sizes and thresholds used by the scans. Defaults are the constants
/// above; deployments may override them from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
  /// Rows examined by [`find_actual_last_row`] per step.
  pub trailing_window:          u32,
  /// Consecutive blank identity cells that end real data.
  pub blank_run_limit:          u32,
  /// Rows examined by fast lookups and daily listings.
  pub recent_window:            u32,
  /// Minimum rows examined when looking for an insertion gap.
  pub insert_scan_rows:         u32,
  pub history_window:           u32,
  pub history_limit:            usize,
  pub health_window:            u32,
  pub health_limit:             usize,
  /// Rows scanned for the current month's statistics.
  pub analytics_window_current: u32,
  /// Rows scanned for earlier months and fiscal years.
  pub analytics_window_past:    u32,
}

impl Default for ScanConfig {
  fn default() -> Self {
    Self {
      trailing_window:          TRAILING_WINDOW,
      blank_run_limit:          BLANK_RUN_LIMIT,
      recent_window:            RECENT_WINDOW,
      insert_scan_rows:         INSERT_SCAN_ROWS,
      history_window:           HISTORY_WINDOW,
      history_limit:            HISTORY_LIMIT,
      health_window:            HEALTH_WINDOW,
      health_limit:             HEALTH_LIMIT,
      analytics_window_current: ANALYTICS_WINDOW_CURRENT,
      analytics_window_past:    ANALYTICS_WINDOW_PAST,
    }
  }
}

// ─── BlankRowFinder ──────────────────────────────────────────────────────────

/// Offset of the first blank cell.
pub fn first_blank(cells: &[CellValue]) -> Option<usize> { cells.iter().position(CellValue::is_blank) }

/// First row at or after `first_row` whose `identity_col` cell is blank.
///
/// The identity column is read in one call over
/// `first_row..=max(last_physical_row, first_row + min_scan_rows - 1)`,
/// never past the first row after `last_physical_row`. When every row in
/// that window is populated the record appends after the last physical row.
pub async fn find_insert_row<S: Sheet>(
  sheet: &S,
  identity_col: u32,
  first_row: u32,
  min_scan_rows: u32,
) -> Result<u32, S::Error> {
  let last = sheet.last_physical_row().await?;
  if last < first_row {
    return Ok(first_row);
  }
  let floor = first_row
    .saturating_add(min_scan_rows.max(1) - 1)
    .min(last.saturating_add(1));
  let scan_end = last.max(floor);
  let cells = read_column(sheet, first_row, identity_col, scan_end - first_row + 1).await?;
  Ok(match first_blank(&cells) {
    Some(offset) => first_row + offset as u32,
    None => last.saturating_add(1),
  })
}

// ─── findActualLastRow ───────────────────────────────────────────────────────

/// Offset of the last populated cell before the first run of `blank_run_limit`
/// consecutive blanks, walking from the oldest row of the window.
pub fn last_populated_before_gap(cells: &[CellValue], blank_run_limit: u32) -> Option<usize> {
  let mut last = None;
  let mut run = 0;
  for (offset, cell) in cells.iter().enumerate() {
    if cell.is_blank() {
      run += 1;
      if last.is_some() && run >= blank_run_limit {
        break;
      }
    } else {
      run = 0;
      last = Some(offset);
    }
  }
  last
}

/// The last row of real data in `identity_col`, or `None` when the table has
/// none.
///
/// Reads the trailing `trailing_window` rows ending at the last physical row
/// in one call. Within the window, blank runs shorter than `blank_run_limit`
/// are gaps inside real data; the first run of that length ends it, and the
/// populated row just before it is the answer. A window with no populated
/// cell at all is stale padding, so the scan steps back one window and
/// repeats.
///
/// A genuine gap of `blank_run_limit` or more blank rows inside the window
/// hides every later row from bounded scans. The threshold is kept for
/// compatibility with existing sheets.
pub async fn find_actual_last_row<S: Sheet>(
  sheet: &S,
  identity_col: u32,
  first_row: u32,
  cfg: &ScanConfig,
) -> Result<Option<u32>, S::Error> {
  let last = sheet.last_physical_row().await?;
  if last < first_row {
    return Ok(None);
  }
  let window = cfg.trailing_window.max(1);
  let mut end = last;
  loop {
    let start = end.saturating_sub(window - 1).max(first_row);
    let cells = read_column(sheet, start, identity_col, end - start + 1).await?;
    if let Some(offset) = last_populated_before_gap(&cells, cfg.blank_run_limit) {
      return Ok(Some(start + offset as u32));
    }
    if start == first_row {
      return Ok(None);
    }
    end = start - 1;
  }
}

/// Read up to `window` full-width rows ending at the actual last log row.
/// Returns the first row number of the slice with the rows.
pub async fn read_trailing<S: Sheet>(
  sheet: &S,
  window: u32,
  width: u32,
  cfg: &ScanConfig,
) -> Result<Option<(u32, Vec<Vec<CellValue>>)>, S::Error> {
  let Some(last) = find_actual_last_row(sheet, LogColumn::UserName.col(), LOG_FIRST_ROW, cfg).await?
  else {
    return Ok(None);
  };
  let rows = window.max(1).min(last - LOG_FIRST_ROW + 1);
  let start = last - rows + 1;
  let data = sheet.read_range(start, 1, rows, width).await?;
  Ok(Some((start, data)))
}

// ─── RowLocator ──────────────────────────────────────────────────────────────

/// Composite identity of a log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKey {
  pub date: NaiveDate,
  pub name: String,
}

impl RowKey {
  pub fn new(date: NaiveDate, name: impl Into<String>) -> Self {
    Self { date, name: name.into().trim().to_string() }
  }

  /// Whether a row read from column 1 carries this key.
  pub fn matches(&self, row: &[CellValue]) -> bool {
    let name = row.get(LogColumn::UserName.idx()).map(codec::text).unwrap_or_default();
    name == self.name
      && row
        .get(LogColumn::Date.idx())
        .and_then(codec::parse_date)
        .is_some_and(|d| d == self.date)
  }
}

/// Lookup strategy for [`locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
  /// Bounded reverse scan over the recent window; may miss old rows.
  Fast,
  /// Forward scan from the first data row to the last physical row.
  Exhaustive,
}

/// Find the log row holding `key`.
///
/// Fast mode walks backward from the actual last row, skips blank-name rows
/// and gives up after `blank_run_limit` of them in a row. Exhaustive mode
/// reads the whole table. Either way the first match wins; duplicates are
/// never reconciled here.
pub async fn locate<S: Sheet>(
  sheet: &S,
  key: &RowKey,
  mode: LocateMode,
  cfg: &ScanConfig,
) -> Result<Option<u32>, S::Error> {
  let key_width = LogColumn::UserName.col();
  match mode {
    LocateMode::Fast => {
      let Some((start, rows)) = read_trailing(sheet, cfg.recent_window, key_width, cfg).await?
      else {
        return Ok(None);
      };
      let mut blanks = 0;
      for (offset, row) in rows.iter().enumerate().rev() {
        if row[LogColumn::UserName.idx()].is_blank() {
          blanks += 1;
          if blanks >= cfg.blank_run_limit {
            break;
          }
          continue;
        }
        blanks = 0;
        if key.matches(row) {
          return Ok(Some(start + offset as u32));
        }
      }
      Ok(None)
    }
    LocateMode::Exhaustive => {
      let last = sheet.last_physical_row().await?;
      if last < LOG_FIRST_ROW {
        return Ok(None);
      }
      let rows = sheet.read_range(LOG_FIRST_ROW, 1, last - LOG_FIRST_ROW + 1, key_width).await?;
      Ok(
        rows
          .iter()
          .position(|row| key.matches(row))
          .map(|offset| LOG_FIRST_ROW + offset as u32),
      )
    }
  }
}
