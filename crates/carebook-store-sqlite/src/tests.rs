//! Integration tests for `SqliteStore` against an in-memory database.

use carebook_core::{
  Error as CoreError,
  billing::{BillingSettings, SaveBillingSettings},
  cell::CellValue,
  grid::Sheet,
  records::{CheckIn, CheckOut, UserInput},
  scan::{LocateMode, ScanConfig, find_actual_last_row},
  schema::LogColumn,
};
use chrono::NaiveDate;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

// ─── Sheets ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_sheet_is_idempotent() {
  let s = store().await;
  let a = s.create_sheet("名簿_2025").await.unwrap();
  a.write(3, 2, CellValue::text("山田太郎")).await.unwrap();

  let b = s.create_sheet("名簿_2025").await.unwrap();
  assert_eq!(b.read(3, 2).await.unwrap(), CellValue::text("山田太郎"));
  assert_eq!(s.sheet_names().await.unwrap(), vec!["名簿_2025"]);
}

#[tokio::test]
async fn missing_sheet_is_reported() {
  let s = store().await;
  let err = s.sheet("支援記録_2025").await.unwrap_err();
  assert!(matches!(err, Error::SheetNotFound(ref n) if n == "支援記録_2025"));
  assert!(matches!(CoreError::from(err), CoreError::SheetNotFound(_)));

  let err = s.facility(2025, false).await.unwrap_err();
  assert!(matches!(err, Error::SheetNotFound(_)));
}

#[tokio::test]
async fn billing_sheet_is_optional_without_create() {
  let s = store().await;
  for name in ["マスタ設定", "支援記録_2024", "名簿_2024"] {
    s.create_sheet(name).await.unwrap();
  }
  let f = s.facility(2024, false).await.unwrap();
  assert_eq!(f.fiscal_year(), Some(2024));
  let err = f.billing_settings().await.unwrap_err();
  assert!(matches!(err, CoreError::SheetNotFound(ref n) if n == "請求_2024"));

  let f = s.facility(2025, true).await.unwrap();
  let settings = BillingSettings { corporate_name: "ひかり会".into(), is_public: true, ..Default::default() };
  f.save_billing_settings(SaveBillingSettings { settings: Some(settings.clone()), fiscal_year: None })
    .await
    .unwrap();
  assert_eq!(f.billing_settings().await.unwrap(), settings);
  assert_eq!(s.fiscal_years().await.unwrap(), [2024, 2025]);
}

#[tokio::test]
async fn sheets_are_isolated() {
  let s = store().await;
  let a = s.create_sheet("a").await.unwrap();
  let b = s.create_sheet("b").await.unwrap();
  a.write(5, 1, CellValue::Number(1.0)).await.unwrap();
  assert_eq!(b.last_physical_row().await.unwrap(), 0);
  assert_eq!(a.last_physical_row().await.unwrap(), 5);
}

// ─── Grid semantics ──────────────────────────────────────────────────────────

#[tokio::test]
async fn read_range_fills_blanks() {
  let s = store().await;
  let sheet = s.create_sheet("grid").await.unwrap();
  sheet
    .write_row(2, 2, vec![CellValue::text("x"), CellValue::Empty, CellValue::Bool(true)])
    .await
    .unwrap();

  let grid = sheet.read_range(1, 1, 3, 4).await.unwrap();
  assert_eq!(grid.len(), 3);
  assert!(grid[0].iter().all(|c| *c == CellValue::Empty));
  assert_eq!(grid[1], vec![CellValue::Empty, CellValue::text("x"), CellValue::Empty, CellValue::Bool(true)]);
  assert!(sheet.read_range(1, 1, 0, 4).await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_write_and_clear_remove_cells() {
  let s = store().await;
  let sheet = s.create_sheet("grid").await.unwrap();
  sheet.write_row(7, 1, vec![CellValue::text("a"), CellValue::text("b")]).await.unwrap();
  sheet.write_row(9, 1, vec![CellValue::text("c")]).await.unwrap();

  sheet.write_row(9, 1, vec![CellValue::Empty]).await.unwrap();
  assert_eq!(sheet.last_physical_row().await.unwrap(), 7);

  sheet.clear_row(7, 1, 2).await.unwrap();
  assert_eq!(sheet.last_physical_row().await.unwrap(), 0);
}

#[tokio::test]
async fn overwrite_changes_kind() {
  let s = store().await;
  let sheet = s.create_sheet("grid").await.unwrap();
  sheet.write(2, 21, CellValue::text("7.00")).await.unwrap();
  sheet.write(2, 21, CellValue::Number(7.0)).await.unwrap();
  assert_eq!(sheet.read(2, 21).await.unwrap(), CellValue::Number(7.0));
}

#[tokio::test]
async fn stale_cell_far_below_data() {
  let s = store().await;
  let sheet = s.create_sheet("log").await.unwrap();
  let col = LogColumn::UserName.col();
  for row in 2..=20 {
    sheet.write(row, col, CellValue::text(format!("u{row}"))).await.unwrap();
  }
  sheet.write(600, col, CellValue::text("stale")).await.unwrap();

  let last = find_actual_last_row(&sheet, col, 2, &ScanConfig::default()).await.unwrap();
  assert_eq!(last, Some(20));
}

// ─── Facility on SQLite ──────────────────────────────────────────────────────

#[tokio::test]
async fn attendance_round_trip() {
  let s = store().await;
  let f = s.facility(2024, true).await.unwrap();
  let today = date("2025-01-15");

  let user = UserInput {
    name: "山田太郎".into(),
    furigana: "ヤマダタロウ".into(),
    status: "契約中".into(),
    scheduled_wed: "通所".into(),
    ..Default::default()
  };
  f.create_user(user).await.unwrap();

  let rec = f
    .check_in(
      CheckIn { user_name: "山田太郎".into(), checkin_time: Some("09:00".into()), ..Default::default() },
      today,
    )
    .await
    .unwrap();
  assert_eq!(rec.scheduled_attendance.as_deref(), Some("通所"));

  let out = f
    .check_out(
      CheckOut {
        user_name: "山田太郎".into(),
        checkout_time: Some("17:00".into()),
        lunch_break: Some("1:00".into()),
        ..Default::default()
      },
      today,
    )
    .await
    .unwrap();
  assert_eq!(out.work_hours, Some(7.0));
  assert_eq!(out.work_minutes, Some(420));

  let again = f
    .check_in(CheckIn { user_name: "山田太郎".into(), ..Default::default() }, today)
    .await
    .unwrap_err();
  assert!(matches!(again, CoreError::Conflict(_)));

  let found = f.user_attendance("山田太郎", today, LocateMode::Exhaustive).await.unwrap().unwrap();
  assert_eq!(found, out);
}

#[tokio::test]
async fn data_survives_reopen() {
  let dir = std::env::temp_dir().join(format!("carebook-test-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("book.sqlite");
  let _ = std::fs::remove_file(&path);

  {
    let s = SqliteStore::open(&path).await.unwrap();
    let sheet = s.create_sheet("マスタ設定").await.unwrap();
    sheet.write(8, 1, CellValue::text("山田太郎")).await.unwrap();
  }
  let s = SqliteStore::open(&path).await.unwrap();
  let sheet = s.sheet("マスタ設定").await.unwrap();
  assert_eq!(sheet.read(8, 1).await.unwrap(), CellValue::text("山田太郎"));

  let _ = std::fs::remove_dir_all(&dir);
}
