//! The `Sheet` trait: a 1-indexed two-dimensional cell grid.
//!
//! Implemented by storage backends (e.g. `carebook-store-sqlite`) and by the
//! in-memory [`MemorySheet`]. Higher layers treat fixed column ranges of a
//! sheet as typed tables; see [`crate::schema`].

use std::{collections::BTreeMap, convert::Infallible, future::Future, sync::RwLock};

use crate::cell::CellValue;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over one grid of cells.
///
/// Rows and columns are 1-based. Ranges are always rectangular; reads beyond
/// populated content yield [`CellValue::Empty`]. Bulk methods are preferred
/// over per-cell ones because the row-location heuristics are built around
/// bounded window reads.
pub trait Sheet: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read `num_rows × num_cols` cells starting at (`row`, `col`).
  fn read_range(
    &self,
    row: u32,
    col: u32,
    num_rows: u32,
    num_cols: u32,
  ) -> impl Future<Output = Result<Vec<Vec<CellValue>>, Self::Error>> + Send + '_;

  /// Write `values` left to right starting at (`row`, `start_col`).
  fn write_row(
    &self,
    row: u32,
    start_col: u32,
    values: Vec<CellValue>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Blank `num_cols` cells starting at (`row`, `start_col`).
  fn clear_row(
    &self,
    row: u32,
    start_col: u32,
    num_cols: u32,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Highest row index holding any content, or 0 for an empty sheet.
  fn last_physical_row(
    &self,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Read a single cell.
  fn read(
    &self,
    row: u32,
    col: u32,
  ) -> impl Future<Output = Result<CellValue, Self::Error>> + Send + '_ {
    async move {
      let mut rows = self.read_range(row, col, 1, 1).await?;
      Ok(rows.pop().and_then(|mut r| r.pop()).unwrap_or_default())
    }
  }

  /// Write a single cell.
  fn write(
    &self,
    row: u32,
    col: u32,
    value: CellValue,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.write_row(row, col, vec![value])
  }
}

/// Read one column as a flat vector.
pub async fn read_column<S: Sheet>(
  sheet: &S,
  start_row: u32,
  col: u32,
  num_rows: u32,
) -> Result<Vec<CellValue>, S::Error> {
  if num_rows == 0 {
    return Ok(Vec::new());
  }
  let rows = sheet.read_range(start_row, col, num_rows, 1).await?;
  Ok(
    rows
      .into_iter()
      .map(|mut r| r.pop().unwrap_or_default())
      .collect(),
  )
}

// ─── In-memory sheet ─────────────────────────────────────────────────────────

/// A sparse in-memory grid. Blank writes remove the cell.
#[derive(Debug, Default)]
pub struct MemorySheet {
  cells: RwLock<BTreeMap<(u32, u32), CellValue>>,
}

impl MemorySheet {
  pub fn new() -> Self { Self::default() }

  /// Build a sheet from `(row, col, value)` triples.
  pub fn with_cells(cells: impl IntoIterator<Item = (u32, u32, CellValue)>) -> Self {
    let sheet = Self::new();
    {
      let mut map = sheet.cells.write().unwrap_or_else(|e| e.into_inner());
      for (row, col, value) in cells {
        if !matches!(value, CellValue::Empty) {
          map.insert((row, col), value);
        }
      }
    }
    sheet
  }
}

impl Sheet for MemorySheet {
  type Error = Infallible;

  async fn read_range(
    &self,
    row: u32,
    col: u32,
    num_rows: u32,
    num_cols: u32,
  ) -> Result<Vec<Vec<CellValue>>, Infallible> {
    let map = self.cells.read().unwrap_or_else(|e| e.into_inner());
    Ok(
      (row..row + num_rows)
        .map(|r| {
          (col..col + num_cols)
            .map(|c| map.get(&(r, c)).cloned().unwrap_or_default())
            .collect()
        })
        .collect(),
    )
  }

  async fn write_row(
    &self,
    row: u32,
    start_col: u32,
    values: Vec<CellValue>,
  ) -> Result<(), Infallible> {
    let mut map = self.cells.write().unwrap_or_else(|e| e.into_inner());
    for (offset, value) in values.into_iter().enumerate() {
      let key = (row, start_col + offset as u32);
      match value {
        CellValue::Empty => map.remove(&key),
        v => map.insert(key, v),
      };
    }
    Ok(())
  }

  async fn clear_row(
    &self,
    row: u32,
    start_col: u32,
    num_cols: u32,
  ) -> Result<(), Infallible> {
    let mut map = self.cells.write().unwrap_or_else(|e| e.into_inner());
    for c in start_col..start_col + num_cols {
      map.remove(&(row, c));
    }
    Ok(())
  }

  async fn last_physical_row(&self) -> Result<u32, Infallible> {
    let map = self.cells.read().unwrap_or_else(|e| e.into_inner());
    Ok(map.keys().map(|(r, _)| *r).max().unwrap_or(0))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn read_write_and_clear() {
    let sheet = MemorySheet::new();
    sheet
      .write_row(3, 2, vec!["a".into(), CellValue::Number(2.0), "c".into()])
      .await
      .unwrap();

    assert_eq!(sheet.read(3, 3).await.unwrap(), CellValue::Number(2.0));
    assert_eq!(sheet.last_physical_row().await.unwrap(), 3);

    let range = sheet.read_range(2, 1, 2, 4).await.unwrap();
    assert_eq!(range.len(), 2);
    assert!(range[0].iter().all(CellValue::is_blank));
    assert_eq!(range[1][1], CellValue::text("a"));

    sheet.clear_row(3, 2, 3).await.unwrap();
    assert_eq!(sheet.last_physical_row().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn blank_write_removes_cell() {
    let sheet = MemorySheet::with_cells([(5, 1, "x".into())]);
    sheet.write(5, 1, CellValue::Empty).await.unwrap();
    assert_eq!(sheet.last_physical_row().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn read_column_flattens() {
    let sheet = MemorySheet::with_cells([(1, 2, "a".into()), (3, 2, "c".into())]);
    let col = read_column(&sheet, 1, 2, 3).await.unwrap();
    assert_eq!(col, vec![CellValue::text("a"), CellValue::Empty, CellValue::text("c")]);
  }
}
