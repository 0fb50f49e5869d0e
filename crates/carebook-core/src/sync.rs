//! User records and cross-table sync between the master and roster sheets.
//!
//! A user exists twice: identity and weekly schedule in the master sheet,
//! the full profile in the roster sheet. The two are joined by name only and
//! are not row-aligned. Every user write goes through here so both copies
//! change together:
//!
//! - the master row is overwritten as a whole;
//! - the roster row is merged: read, overlay the fields present in the
//!   payload, write the full row back;
//! - a status change writes only `status` (and `leaveDate`) in each sheet.
//!
//! A roster storage failure restores the master row. A roster row missing by
//! name follows the facility's [`SyncPolicy`].

use std::{collections::BTreeMap, str::FromStr as _};

use tracing::{info, warn};

use crate::{
  Error, Facility, Result, SyncPolicy,
  cell::CellValue,
  codec,
  error::storage,
  grid::{Sheet, read_column},
  labels::UserStatus,
  records::{MasterUser, StatusChange, UserInput, UserProfile},
  scan::{find_insert_row, first_blank},
  schema::{ROSTER_FIRST_ROW, ROSTER_WIDTH, RosterField, user},
};

/// Roster fields supplied by a write, keyed by column. `CellValue::Empty`
/// clears a field; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterPatch(pub BTreeMap<RosterField, CellValue>);

impl RosterPatch {
  /// Collect writable roster fields from a JSON object. Unknown keys and
  /// computed columns are ignored.
  pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Self {
    use serde_json::Value;
    let fields = map
      .iter()
      .filter_map(|(key, value)| {
        let field = RosterField::from_str(key).ok().filter(|f| !f.is_computed())?;
        let cell = match value {
          Value::Null => CellValue::Empty,
          Value::String(s) => CellValue::text(s.trim()),
          Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
          Value::Bool(b) => CellValue::Bool(*b),
          other => CellValue::text(other.to_string()),
        };
        Some((field, cell))
      })
      .collect();
    Self(fields)
  }

  pub fn set(&mut self, field: RosterField, value: CellValue) { self.0.insert(field, value); }

  pub fn get(&self, field: RosterField) -> Option<&CellValue> { self.0.get(&field) }

  /// Overlay onto a full-width roster row.
  pub fn apply(&self, row: &mut [CellValue]) {
    for (field, value) in &self.0 {
      if let Some(slot) = row.get_mut(field.idx()) {
        *slot = value.clone();
      }
    }
  }
}

/// A user write after validation.
struct ValidUser {
  name:     String,
  furigana: String,
  status:   UserStatus,
  schedule: [String; 7],
  roster:   RosterPatch,
}

impl ValidUser {
  fn from_input(input: &UserInput) -> Result<Self> {
    let name = input.name.trim();
    if name.is_empty() {
      return Err(Error::validation("利用者名を入力してください"));
    }
    let furigana = input.furigana.trim();
    if furigana.is_empty() {
      return Err(Error::validation("フリガナを入力してください"));
    }
    let mut status: UserStatus = input
      .status
      .trim()
      .parse()
      .map_err(|_| Error::validation("契約状態は「契約中」または「退所済み」を指定してください"))?;

    let mut roster = RosterPatch::from_json(&input.roster);
    if roster.get(RosterField::LeaveDate).is_some_and(|d| !d.is_blank()) {
      status = UserStatus::Departed;
    }
    roster.set(RosterField::Name, CellValue::text(name));
    roster.set(RosterField::NameKana, CellValue::text(furigana));
    roster.set(RosterField::Status, CellValue::text(status.as_ref()));

    Ok(Self {
      name: name.to_string(),
      furigana: furigana.to_string(),
      status,
      schedule: input.schedule().map(|s| s.trim().to_string()),
      roster,
    })
  }

  fn master_cells(&self) -> Vec<CellValue> {
    let mut cells = vec![
      CellValue::text(&self.name),
      CellValue::text(&self.furigana),
      CellValue::text(self.status.as_ref()),
    ];
    cells.extend(self.schedule.iter().map(|s| CellValue::text(s.as_str())));
    cells
  }

  fn to_master_user(&self, row_number: u32) -> MasterUser {
    let mut u = MasterUser {
      name: self.name.clone(),
      furigana: self.furigana.clone(),
      status: self.status.as_ref().to_string(),
      row_number,
      ..Default::default()
    };
    u.set_schedule(self.schedule.clone());
    u
  }
}

/// Result of a user create or update.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedUser {
  #[serde(flatten)]
  pub user:              MasterUser,
  pub roster_row_number: Option<u32>,
}

fn check_user_row(row_number: Option<u32>) -> Result<u32> {
  match row_number {
    Some(r) if (user::FIRST_ROW..=user::LAST_ROW).contains(&r) => Ok(r),
    Some(_) => Err(Error::validation("行番号が利用者の範囲外です")),
    None => Err(Error::validation("行番号を指定してください")),
  }
}

impl<S: Sheet> Facility<S> {
  // ── Roster access ─────────────────────────────────────────────────────

  /// Every roster data row with its row number.
  pub(crate) async fn roster_rows(&self) -> Result<Vec<(u32, Vec<CellValue>)>> {
    let last = self.roster.last_physical_row().await.map_err(storage)?;
    if last < ROSTER_FIRST_ROW {
      return Ok(Vec::new());
    }
    let rows = self
      .roster
      .read_range(ROSTER_FIRST_ROW, 1, last - ROSTER_FIRST_ROW + 1, ROSTER_WIDTH)
      .await
      .map_err(storage)?;
    Ok(
      rows
        .into_iter()
        .enumerate()
        .map(|(offset, row)| (ROSTER_FIRST_ROW + offset as u32, row))
        .collect(),
    )
  }

  /// Row number of the first roster row named `name`.
  async fn find_roster_row(&self, name: &str) -> Result<Option<u32>> {
    let last = self.roster.last_physical_row().await.map_err(storage)?;
    if last < ROSTER_FIRST_ROW {
      return Ok(None);
    }
    let names = read_column(&self.roster, ROSTER_FIRST_ROW, RosterField::Name.col(), last - ROSTER_FIRST_ROW + 1)
      .await
      .map_err(storage)?;
    Ok(
      names
        .iter()
        .position(|c| codec::text(c) == name)
        .map(|offset| ROSTER_FIRST_ROW + offset as u32),
    )
  }

  /// Merge-over-existing-row write.
  async fn merge_roster_row(&self, row: u32, patch: &RosterPatch) -> Result<()> {
    let mut current = self
      .roster
      .read_range(row, 1, 1, ROSTER_WIDTH)
      .await
      .map_err(storage)?
      .pop()
      .unwrap_or_default();
    current.resize(ROSTER_WIDTH as usize, CellValue::Empty);
    patch.apply(&mut current);
    self.roster.write_row(row, 1, current).await.map_err(storage)
  }

  async fn master_row(&self, row: u32) -> Result<Vec<CellValue>> {
    Ok(
      self
        .master
        .read_range(row, user::NAME, 1, user::WIDTH)
        .await
        .map_err(storage)?
        .pop()
        .unwrap_or_default(),
    )
  }

  /// Put a master row back after a failed roster write. The original error
  /// is returned either way.
  async fn restore_master(&self, row: u32, snapshot: Vec<CellValue>, cause: Error) -> Error {
    warn!(row, error = %cause, "roster write failed; restoring master row");
    if let Err(e) = self.master.write_row(row, user::NAME, snapshot).await {
      warn!(row, error = %e, "master row restore failed");
    }
    cause
  }

  /// Apply the roster miss policy. `Ok(())` means carry on without the
  /// roster write.
  async fn roster_miss(&self, name: &str, master_row: u32, snapshot: Vec<CellValue>) -> Result<()> {
    match self.sync_policy {
      SyncPolicy::BestEffort => {
        warn!(name, "no roster row for user; roster left unchanged");
        Ok(())
      }
      SyncPolicy::Strict => {
        let cause = Error::not_found(format!("名簿に利用者が見つかりません: {name}"));
        Err(self.restore_master(master_row, snapshot, cause).await)
      }
    }
  }

  // ── Operations ────────────────────────────────────────────────────────

  /// `user/list`: master users with their roster profiles.
  pub async fn user_list(&self) -> Result<Vec<UserProfile>> {
    let users = self.read_master_users().await?;
    let mut roster: BTreeMap<String, (u32, Vec<CellValue>)> = BTreeMap::new();
    for (row, cells) in self.roster_rows().await? {
      let name = codec::text(&cells[RosterField::Name.idx()]);
      if !name.is_empty() {
        roster.entry(name).or_insert((row, cells));
      }
    }

    Ok(
      users
        .into_iter()
        .map(|user| {
          let found = roster.get(&user.name);
          let fields: BTreeMap<&'static str, String> = found
            .map(|(_, cells)| {
              RosterField::profile()
                .map(|f| (f.key(), codec::text(&cells[f.idx()])))
                .collect()
            })
            .unwrap_or_default();
          UserProfile { roster_row_number: found.map(|(row, _)| *row), roster: fields, user }
        })
        .collect(),
    )
  }

  /// `user/create`: master row at the first free slot. The roster row kept
  /// under the same name is reused; otherwise its own first free slot.
  pub async fn create_user(&self, input: UserInput) -> Result<SavedUser> {
    let valid = ValidUser::from_input(&input)?;

    let _master = self.master_lock.lock().await;
    let names = read_column(&self.master, user::FIRST_ROW, user::NAME, user::ROWS)
      .await
      .map_err(storage)?;
    if names.iter().any(|c| codec::text(c) == valid.name) {
      return Err(Error::conflict("この利用者名は既に登録されています"));
    }
    let row = first_blank(&names)
      .map(|offset| user::FIRST_ROW + offset as u32)
      .ok_or_else(|| Error::conflict("利用者登録の上限に達しています"))?;

    let snapshot = self.master_row(row).await?;
    self.master.write_row(row, user::NAME, valid.master_cells()).await.map_err(storage)?;

    let _roster = self.roster_lock.lock().await;
    let existing = match self.find_roster_row(&valid.name).await {
      Ok(r) => r,
      Err(e) => return Err(self.restore_master(row, snapshot, e).await),
    };
    let roster_row = match existing {
      Some(r) => r,
      None => match find_insert_row(&self.roster, RosterField::Name.col(), ROSTER_FIRST_ROW, 1).await {
        Ok(r) => r,
        Err(e) => return Err(self.restore_master(row, snapshot, storage(e)).await),
      },
    };
    if let Err(e) = self.merge_roster_row(roster_row, &valid.roster).await {
      return Err(self.restore_master(row, snapshot, e).await);
    }

    info!(name = %valid.name, row, roster_row, reused = existing.is_some(), "user created");
    Ok(SavedUser { user: valid.to_master_user(row), roster_row_number: Some(roster_row) })
  }

  /// `user/update` by master row number. The roster row is found by the
  /// name stored before this update, so renames carry across.
  pub async fn update_user(&self, input: UserInput) -> Result<SavedUser> {
    let row = check_user_row(input.row_number)?;
    let valid = ValidUser::from_input(&input)?;

    let _master = self.master_lock.lock().await;
    let snapshot = self.master_row(row).await?;
    let original_name = snapshot.first().map(codec::text).unwrap_or_default();
    if original_name.is_empty() {
      return Err(Error::not_found("利用者が見つかりません"));
    }
    let names = read_column(&self.master, user::FIRST_ROW, user::NAME, user::ROWS)
      .await
      .map_err(storage)?;
    let duplicate = names
      .iter()
      .enumerate()
      .any(|(offset, c)| user::FIRST_ROW + offset as u32 != row && codec::text(c) == valid.name);
    if duplicate {
      return Err(Error::conflict("この利用者名は既に登録されています"));
    }

    self.master.write_row(row, user::NAME, valid.master_cells()).await.map_err(storage)?;

    let _roster = self.roster_lock.lock().await;
    let roster_row = match self.find_roster_row(&original_name).await {
      Ok(r) => r,
      Err(e) => return Err(self.restore_master(row, snapshot, e).await),
    };
    match roster_row {
      Some(r) => {
        if let Err(e) = self.merge_roster_row(r, &valid.roster).await {
          return Err(self.restore_master(row, snapshot, e).await);
        }
      }
      None => self.roster_miss(&original_name, row, snapshot).await?,
    }

    info!(name = %valid.name, row, ?roster_row, "user updated");
    Ok(SavedUser { user: valid.to_master_user(row), roster_row_number: roster_row })
  }

  /// `user/change-status`: only `status`, plus `leaveDate` in the roster
  /// (set when departing with a date, cleared when reactivated).
  pub async fn change_user_status(&self, change: StatusChange) -> Result<()> {
    let row = check_user_row(Some(change.row_number))?;
    let status: UserStatus = change
      .status
      .trim()
      .parse()
      .map_err(|_| Error::validation("契約状態は「契約中」または「退所済み」を指定してください"))?;

    let _master = self.master_lock.lock().await;
    let snapshot = self.master_row(row).await?;
    let name = snapshot.first().map(codec::text).unwrap_or_default();
    if name.is_empty() {
      return Err(Error::not_found("利用者が見つかりません"));
    }
    let status_cell = CellValue::text(status.as_ref());
    self.master.write(row, user::STATUS, status_cell.clone()).await.map_err(storage)?;

    let _roster = self.roster_lock.lock().await;
    let roster_row = match self.find_roster_row(&name).await {
      Ok(r) => r,
      Err(e) => return Err(self.restore_master(row, snapshot, e).await),
    };
    let Some(roster_row) = roster_row else {
      return self.roster_miss(&name, row, snapshot).await;
    };

    let leave_date = match status {
      UserStatus::Departed => change
        .leave_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(CellValue::text),
      UserStatus::Active => Some(CellValue::Empty),
    };
    let mut writes = vec![(RosterField::Status, status_cell)];
    writes.extend(leave_date.map(|d| (RosterField::LeaveDate, d)));
    for (field, value) in writes {
      if let Err(e) = self.roster.write(roster_row, field.col(), value).await {
        return Err(self.restore_master(row, snapshot, storage(e)).await);
      }
    }

    info!(name, row, roster_row, status = status.as_ref(), "user status changed");
    Ok(())
  }

  /// `user/delete`: blank the master identity and schedule cells and the
  /// whole roster row. Both slots become reusable.
  pub async fn delete_user(&self, row_number: u32) -> Result<()> {
    let row = check_user_row(Some(row_number))?;

    let _master = self.master_lock.lock().await;
    let snapshot = self.master_row(row).await?;
    let name = snapshot.first().map(codec::text).unwrap_or_default();
    if name.is_empty() {
      return Err(Error::not_found("利用者が見つかりません"));
    }
    self.master.clear_row(row, user::NAME, user::WIDTH).await.map_err(storage)?;

    let _roster = self.roster_lock.lock().await;
    let roster_row = match self.find_roster_row(&name).await {
      Ok(r) => r,
      Err(e) => return Err(self.restore_master(row, snapshot, e).await),
    };
    match roster_row {
      Some(r) => {
        if let Err(e) = self.roster.clear_row(r, 1, ROSTER_WIDTH).await {
          return Err(self.restore_master(row, snapshot, storage(e)).await);
        }
      }
      None => self.roster_miss(&name, row, snapshot).await?,
    }

    info!(name, row, ?roster_row, "user deleted");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{
    facility::testing::{facility, seed_user},
    grid::MemorySheet,
  };

  fn input(body: serde_json::Value) -> UserInput { serde_json::from_value(body).unwrap() }

  fn yamada() -> serde_json::Value {
    json!({
      "name": "山田太郎",
      "furigana": "ヤマダタロウ",
      "status": "契約中",
      "scheduledMon": "通所",
      "scheduledWed": "在宅",
      "mobilePhone": "090-1234-5678",
      "city": "大阪市",
      "postalCode": "530-0001",
      "age": 99,
      "unknownKey": "ignored"
    })
  }

  async fn roster_row(f: &Facility<MemorySheet>, row: u32) -> Vec<CellValue> {
    f.roster.read_range(row, 1, 1, ROSTER_WIDTH).await.unwrap().pop().unwrap()
  }

  #[tokio::test]
  async fn create_fans_out_to_both_sheets() {
    let f = facility();
    let saved = f.create_user(input(yamada())).await.unwrap();
    assert_eq!(saved.user.row_number, 8);
    assert_eq!(saved.roster_row_number, Some(3));

    let list = f.user_list().await.unwrap();
    assert_eq!(list.len(), 1);
    let u = &list[0];
    assert_eq!(u.user.name, "山田太郎");
    assert_eq!(u.user.scheduled_wed, "在宅");
    assert_eq!(u.roster_row_number, Some(3));
    assert_eq!(u.roster["mobilePhone"], "090-1234-5678");
    assert_eq!(u.roster["city"], "大阪市");

    let row = roster_row(&f, 3).await;
    assert_eq!(row[RosterField::Age.idx()], CellValue::Empty);
    assert_eq!(row[RosterField::NameKana.idx()], CellValue::text("ヤマダタロウ"));
  }

  #[tokio::test]
  async fn create_rejects_duplicates_and_bad_status() {
    let f = facility();
    f.create_user(input(yamada())).await.unwrap();
    assert!(matches!(f.create_user(input(yamada())).await.unwrap_err(), Error::Conflict(_)));

    let mut bad = yamada();
    bad["name"] = json!("別人");
    bad["status"] = json!("休止中");
    assert!(matches!(f.create_user(input(bad)).await.unwrap_err(), Error::Validation(_)));

    let mut no_kana = yamada();
    no_kana["furigana"] = json!("");
    assert!(matches!(f.create_user(input(no_kana)).await.unwrap_err(), Error::Validation(_)));
  }

  #[tokio::test]
  async fn leave_date_forces_departed() {
    let f = facility();
    let mut body = yamada();
    body["leaveDate"] = json!("2025-03-31");
    let saved = f.create_user(input(body)).await.unwrap();
    assert_eq!(saved.user.status, "退所済み");
  }

  #[tokio::test]
  async fn update_merges_roster_and_follows_rename() {
    let f = facility();
    f.create_user(input(yamada())).await.unwrap();

    let saved = f
      .update_user(input(json!({
        "rowNumber": 8,
        "name": "山田太朗",
        "furigana": "ヤマダタロウ",
        "status": "契約中",
        "city": "堺市"
      })))
      .await
      .unwrap();
    assert_eq!(saved.roster_row_number, Some(3));

    let row = roster_row(&f, 3).await;
    assert_eq!(row[RosterField::Name.idx()], CellValue::text("山田太朗"));
    assert_eq!(row[RosterField::City.idx()], CellValue::text("堺市"));
    // Untouched by this payload.
    assert_eq!(row[RosterField::MobilePhone.idx()], CellValue::text("090-1234-5678"));
  }

  #[tokio::test]
  async fn status_change_writes_only_status_and_leave_date() {
    let f = facility();
    f.create_user(input(yamada())).await.unwrap();
    let before = roster_row(&f, 3).await;

    f.change_user_status(StatusChange {
      row_number: 8,
      status:     "退所済み".into(),
      leave_date: Some("2025-03-31".into()),
    })
    .await
    .unwrap();

    let after = roster_row(&f, 3).await;
    let changed: Vec<usize> = (0..ROSTER_WIDTH as usize).filter(|i| before[*i] != after[*i]).collect();
    assert_eq!(changed, vec![RosterField::Status.idx(), RosterField::LeaveDate.idx()]);
    assert_eq!(after[RosterField::Status.idx()], CellValue::text("退所済み"));
    assert_eq!(f.all_users().await.unwrap()[0].status, "退所済み");

    f.change_user_status(StatusChange { row_number: 8, status: "契約中".into(), leave_date: None })
      .await
      .unwrap();
    assert_eq!(roster_row(&f, 3).await[RosterField::LeaveDate.idx()], CellValue::Empty);
  }

  #[tokio::test]
  async fn delete_blanks_both_rows_and_frees_slots() {
    let f = facility();
    f.create_user(input(yamada())).await.unwrap();
    f.delete_user(8).await.unwrap();

    assert!(f.user_list().await.unwrap().is_empty());
    assert!(roster_row(&f, 3).await.iter().all(CellValue::is_blank));

    let again = f.create_user(input(yamada())).await.unwrap();
    assert_eq!((again.user.row_number, again.roster_row_number), (8, Some(3)));
  }

  #[tokio::test]
  async fn deleting_a_middle_user_keeps_later_users_visible() {
    let f = facility();
    for (name, kana) in [("A", "エー"), ("B", "ビー"), ("C", "シー")] {
      f.create_user(input(json!({
        "name": name, "furigana": kana, "status": "契約中", "scheduledWed": "通所",
      })))
      .await
      .unwrap();
    }
    f.delete_user(8).await.unwrap();

    let names: Vec<String> = f.all_users().await.unwrap().into_iter().map(|u| u.name).collect();
    assert_eq!(names, vec!["B", "C"]);
    let listed: Vec<String> = f.user_list().await.unwrap().into_iter().map(|p| p.user.name).collect();
    assert_eq!(listed, vec!["B", "C"]);
    assert_eq!(f.scheduled_label("C", chrono::Weekday::Wed).await.unwrap().as_deref(), Some("通所"));

    // The freed slot is reused without hiding anyone.
    let d = f.create_user(input(json!({ "name": "D", "furigana": "ディー", "status": "契約中" }))).await.unwrap();
    assert_eq!(d.user.row_number, 8);
    assert_eq!(f.all_users().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn create_reuses_existing_roster_row() {
    let f = facility();
    let mut kept = vec![CellValue::Empty; ROSTER_WIDTH as usize];
    kept[RosterField::Name.idx()] = CellValue::text("山田太郎");
    kept[RosterField::City.idx()] = CellValue::text("旧市");
    kept[RosterField::MobilePhone.idx()] = CellValue::text("080-0000-0000");
    f.roster.write_row(3, 1, kept).await.unwrap();

    let mut body = yamada();
    body["city"] = json!("新市");
    body.as_object_mut().unwrap().remove("mobilePhone");
    let saved = f.create_user(input(body)).await.unwrap();
    assert_eq!(saved.roster_row_number, Some(3));

    let row = roster_row(&f, 3).await;
    assert_eq!(row[RosterField::City.idx()], CellValue::text("新市"));
    assert_eq!(row[RosterField::MobilePhone.idx()], CellValue::text("080-0000-0000"));
    assert!(roster_row(&f, 4).await.iter().all(CellValue::is_blank));

    let listed = f.user_list().await.unwrap();
    assert_eq!(listed[0].roster["city"], "新市");
  }

  #[tokio::test]
  async fn roster_miss_is_skipped_under_best_effort() {
    let f = facility();
    seed_user(&f, 8, "幽霊", "契約中", [""; 7]).await;
    f.delete_user(8).await.unwrap();
    assert!(f.all_users().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn roster_miss_rolls_back_under_strict() {
    let f = facility().with_sync_policy(SyncPolicy::Strict);
    seed_user(&f, 8, "幽霊", "契約中", [""; 7]).await;

    let err = f
      .change_user_status(StatusChange { row_number: 8, status: "退所済み".into(), leave_date: None })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(f.all_users().await.unwrap()[0].status, "契約中");

    assert!(matches!(f.delete_user(8).await.unwrap_err(), Error::NotFound(_)));
    assert_eq!(f.all_users().await.unwrap().len(), 1);
  }
}
