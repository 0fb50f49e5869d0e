//! [`SqliteStore`] and [`SqliteSheet`], the SQLite implementation of
//! [`Sheet`].

use std::{path::Path, sync::Arc};

use carebook_core::{
  Facility,
  cell::CellValue,
  grid::Sheet,
  schema::{MASTER_SHEET, billing_sheet_name, log_sheet_name, roster_sheet_name, sheet_fiscal_year},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::info;

use crate::{
  Error, Result,
  encode::{RawCell, encode_cell},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A workbook of named sheets in a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Names of every sheet, oldest first.
  pub async fn sheet_names(&self) -> Result<Vec<String>> {
    let names = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sheets ORDER BY sheet_id")?;
        let names = stmt
          .query_map([], |r| r.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
      })
      .await?;
    Ok(names)
  }

  /// Fiscal years with at least one per-year sheet, oldest first.
  pub async fn fiscal_years(&self) -> Result<Vec<i32>> {
    let mut years: Vec<i32> = self.sheet_names().await?.iter().filter_map(|n| sheet_fiscal_year(n)).collect();
    years.sort_unstable();
    years.dedup();
    Ok(years)
  }

  /// Create `name` if it does not exist and return a handle to it.
  pub async fn create_sheet(&self, name: &str) -> Result<SqliteSheet> {
    let owned = name.to_owned();
    let created_at = Utc::now().to_rfc3339();
    let (sheet_id, inserted) = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO sheets (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![owned, created_at],
        )?;
        let id: i64 =
          conn.query_row("SELECT sheet_id FROM sheets WHERE name = ?1", rusqlite::params![owned], |r| r.get(0))?;
        Ok((id, inserted > 0))
      })
      .await?;
    if inserted {
      info!(sheet = name, "created sheet");
    }
    Ok(self.handle(sheet_id, name))
  }

  /// A handle to an existing sheet.
  pub async fn sheet(&self, name: &str) -> Result<SqliteSheet> {
    let owned = name.to_owned();
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row("SELECT sheet_id FROM sheets WHERE name = ?1", rusqlite::params![owned], |r| r.get(0))
            .optional()?,
        )
      })
      .await?;
    match id {
      Some(id) => Ok(self.handle(id, name)),
      None => Err(Error::SheetNotFound(name.to_owned())),
    }
  }

  /// The three sheets of a fiscal year bound into a [`Facility`], plus the
  /// year's billing sheet.
  ///
  /// With `create_missing`, absent sheets are created empty; otherwise a
  /// missing master, log or roster sheet is an error and a missing billing
  /// sheet leaves billing settings unavailable.
  pub async fn facility(&self, fiscal_year: i32, create_missing: bool) -> Result<Facility<SqliteSheet>> {
    let names = [MASTER_SHEET.to_owned(), log_sheet_name(fiscal_year), roster_sheet_name(fiscal_year)];
    let mut sheets = Vec::with_capacity(3);
    for name in &names {
      let sheet = if create_missing { self.create_sheet(name).await? } else { self.sheet(name).await? };
      sheets.push(sheet);
    }
    let [master, log, roster]: [SqliteSheet; 3] = sheets
      .try_into()
      .map_err(|_| Error::SheetNotFound(names.join(", ")))?;
    let billing_name = billing_sheet_name(fiscal_year);
    let billing = match self.sheet(&billing_name).await {
      Ok(sheet) => Some(sheet),
      Err(Error::SheetNotFound(_)) if create_missing => Some(self.create_sheet(&billing_name).await?),
      Err(Error::SheetNotFound(_)) => None,
      Err(e) => return Err(e),
    };
    let facility = Facility::new(master, log, roster).with_fiscal_year(fiscal_year);
    Ok(match billing {
      Some(sheet) => facility.with_billing(sheet),
      None => facility,
    })
  }

  fn handle(&self, sheet_id: i64, name: &str) -> SqliteSheet {
    SqliteSheet { conn: self.conn.clone(), sheet_id, name: Arc::from(name) }
  }
}

// ─── Sheet ───────────────────────────────────────────────────────────────────

/// One named sheet. Cheap to clone.
#[derive(Clone)]
pub struct SqliteSheet {
  conn:     tokio_rusqlite::Connection,
  sheet_id: i64,
  name:     Arc<str>,
}

impl SqliteSheet {
  pub fn name(&self) -> &str { &self.name }
}

impl std::fmt::Debug for SqliteSheet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteSheet").field("sheet_id", &self.sheet_id).field("name", &self.name).finish()
  }
}

impl Sheet for SqliteSheet {
  type Error = Error;

  async fn read_range(&self, row: u32, col: u32, num_rows: u32, num_cols: u32) -> Result<Vec<Vec<CellValue>>> {
    if num_rows == 0 || num_cols == 0 {
      return Ok(vec![Vec::new(); num_rows as usize]);
    }
    let sheet_id = self.sheet_id;
    let (last_row, last_col) = (row + num_rows - 1, col + num_cols - 1);

    let raws: Vec<RawCell> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT row_idx, col_idx, kind, value FROM cells
           WHERE sheet_id = ?1 AND row_idx BETWEEN ?2 AND ?3 AND col_idx BETWEEN ?4 AND ?5",
        )?;
        let raws = stmt
          .query_map(rusqlite::params![sheet_id, row, last_row, col, last_col], |r| {
            Ok(RawCell { row: r.get(0)?, col: r.get(1)?, kind: r.get(2)?, value: r.get(3)? })
          })?
          .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(raws)
      })
      .await?;

    let mut grid = vec![vec![CellValue::Empty; num_cols as usize]; num_rows as usize];
    for raw in raws {
      let (r, c) = ((raw.row - row) as usize, (raw.col - col) as usize);
      grid[r][c] = raw.decode()?;
    }
    Ok(grid)
  }

  async fn write_row(&self, row: u32, start_col: u32, values: Vec<CellValue>) -> Result<()> {
    let sheet_id = self.sheet_id;
    let encoded: Vec<(u32, Option<(&'static str, String)>)> = values
      .iter()
      .enumerate()
      .map(|(offset, v)| (start_col + offset as u32, encode_cell(v)))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut upsert = tx.prepare_cached(
            "INSERT INTO cells (sheet_id, row_idx, col_idx, kind, value) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (sheet_id, row_idx, col_idx) DO UPDATE SET kind = excluded.kind, value = excluded.value",
          )?;
          let mut delete =
            tx.prepare_cached("DELETE FROM cells WHERE sheet_id = ?1 AND row_idx = ?2 AND col_idx = ?3")?;
          for (col, cell) in &encoded {
            match cell {
              Some((kind, value)) => upsert.execute(rusqlite::params![sheet_id, row, col, kind, value])?,
              None => delete.execute(rusqlite::params![sheet_id, row, col])?,
            };
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear_row(&self, row: u32, start_col: u32, num_cols: u32) -> Result<()> {
    if num_cols == 0 {
      return Ok(());
    }
    let sheet_id = self.sheet_id;
    let last_col = start_col + num_cols - 1;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM cells WHERE sheet_id = ?1 AND row_idx = ?2 AND col_idx BETWEEN ?3 AND ?4",
          rusqlite::params![sheet_id, row, start_col, last_col],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn last_physical_row(&self) -> Result<u32> {
    let sheet_id = self.sheet_id;
    let last: u32 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(MAX(row_idx), 0) FROM cells WHERE sheet_id = ?1",
          rusqlite::params![sheet_id],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(last)
  }
}
