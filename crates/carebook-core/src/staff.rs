//! Staff accounts stored in the master sheet's staff region.
//!
//! Passwords are whatever string the caller seals them into: plaintext by
//! default, or a hash when the caller supplies a sealing function. Login
//! comparison lives with the caller; this module only finds the row.

use tracing::info;

use crate::{
  Error, Facility, Result,
  cell::CellValue,
  codec,
  error::storage,
  grid::Sheet,
  labels::StaffRole,
  records::{StaffCredential, StaffInput, StaffMember},
  scan::first_blank,
  schema::staff as col,
};

/// Role reported at login when the stored role is blank.
pub const DEFAULT_LOGIN_ROLE: &str = "支援員";

/// Minimum strength: six characters with an upper-case letter, a lower-case
/// letter and a digit. Failures are reported one at a time.
pub fn validate_password(password: &str) -> Result<()> {
  if password.chars().count() < 6 {
    return Err(Error::validation("パスワードは6文字以上で入力してください"));
  }
  if !password.chars().any(|c| c.is_ascii_uppercase()) {
    return Err(Error::validation("パスワードには大文字を含めてください"));
  }
  if !password.chars().any(|c| c.is_ascii_lowercase()) {
    return Err(Error::validation("パスワードには小文字を含めてください"));
  }
  if !password.chars().any(|c| c.is_ascii_digit()) {
    return Err(Error::validation("パスワードには数字を含めてください"));
  }
  Ok(())
}

fn parse_role(role: Option<&str>) -> Result<StaffRole> {
  match role.map(str::trim).filter(|r| !r.is_empty()) {
    None => Ok(StaffRole::default()),
    Some(r) => r
      .parse()
      .map_err(|_| Error::validation("権限は「管理者」または「従業員」を指定してください")),
  }
}

fn check_row(row_number: Option<u32>) -> Result<u32> {
  match row_number {
    Some(r) if (col::FIRST_ROW..=col::LAST_ROW).contains(&r) => Ok(r),
    Some(_) => Err(Error::validation("行番号が職員の範囲外です")),
    None => Err(Error::validation("行番号を指定してください")),
  }
}

fn cell(row: &[CellValue], c: u32) -> String { codec::text(&row[(c - col::NAME) as usize]) }

fn decode(row: &[CellValue], row_number: u32) -> StaffMember {
  let role = cell(row, col::ROLE);
  StaffMember {
    name: cell(row, col::NAME),
    role: if role.is_empty() { StaffRole::default().as_ref().to_string() } else { role },
    email: cell(row, col::EMAIL),
    job_type: cell(row, col::JOB_TYPE),
    qualification: cell(row, col::QUALIFICATION),
    placement: cell(row, col::PLACEMENT),
    employment_type: cell(row, col::EMPLOYMENT_TYPE),
    retirement_date: cell(row, col::RETIREMENT_DATE),
    row_number,
  }
}

fn encode(input: &StaffInput, role: StaffRole, password: String) -> Vec<CellValue> {
  vec![
    CellValue::text(input.name.trim()),
    CellValue::text(role.as_ref()),
    CellValue::text(input.email.trim()),
    CellValue::text(password),
    CellValue::text(input.job_type.trim()),
    CellValue::text(input.qualification.trim()),
    CellValue::text(input.placement.trim()),
    CellValue::text(input.employment_type.trim()),
    codec::date_cell(Some(input.retirement_date.trim())),
  ]
}

impl<S: Sheet> Facility<S> {
  async fn staff_rows(&self) -> Result<Vec<Vec<CellValue>>> {
    self
      .master
      .read_range(col::FIRST_ROW, col::NAME, col::ROWS, col::WIDTH)
      .await
      .map_err(storage)
  }

  /// Fail with a conflict if another row already uses `email`
  /// (case-insensitive).
  fn ensure_unique_email(rows: &[Vec<CellValue>], email: &str, except: Option<u32>) -> Result<()> {
    let email = email.trim().to_lowercase();
    let taken = rows.iter().enumerate().any(|(offset, row)| {
      Some(col::FIRST_ROW + offset as u32) != except
        && !cell(row, col::NAME).is_empty()
        && cell(row, col::EMAIL).to_lowercase() == email
    });
    if taken {
      Err(Error::conflict("このメールアドレスは既に登録されています"))
    } else {
      Ok(())
    }
  }

  fn validate_identity(input: &StaffInput) -> Result<StaffRole> {
    if input.name.trim().is_empty() {
      return Err(Error::validation("職員名を入力してください"));
    }
    if input.email.trim().is_empty() {
      return Err(Error::validation("メールアドレスを入力してください"));
    }
    parse_role(input.role.as_deref())
  }

  /// `staff/list`: every named staff row. Passwords are never returned.
  pub async fn list_staff(&self) -> Result<Vec<StaffMember>> {
    let rows = self.staff_rows().await?;
    Ok(
      rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !cell(row, col::NAME).is_empty())
        .map(|(offset, row)| decode(row, col::FIRST_ROW + offset as u32))
        .collect(),
    )
  }

  /// `staff/create` storing the password as given.
  pub async fn create_staff(&self, input: StaffInput) -> Result<StaffMember> {
    self.create_staff_sealed(input, |p| Ok(p.to_string())).await
  }

  /// `staff/create`, passing the validated password through `seal` before it
  /// is stored.
  pub async fn create_staff_sealed(
    &self,
    input: StaffInput,
    seal: impl FnOnce(&str) -> Result<String>,
  ) -> Result<StaffMember> {
    let role = Self::validate_identity(&input)?;
    if input.password.is_empty() {
      return Err(Error::validation("パスワードを入力してください"));
    }
    validate_password(&input.password)?;
    let password = seal(&input.password)?;

    let _guard = self.master_lock.lock().await;
    let rows = self.staff_rows().await?;
    Self::ensure_unique_email(&rows, &input.email, None)?;
    let names: Vec<CellValue> = rows.iter().map(|r| r[0].clone()).collect();
    let row = first_blank(&names)
      .map(|offset| col::FIRST_ROW + offset as u32)
      .ok_or_else(|| Error::conflict("職員登録の上限に達しています"))?;

    let cells = encode(&input, role, password);
    let member = decode(&cells, row);
    self.master.write_row(row, col::NAME, cells).await.map_err(storage)?;
    info!(row, email = %member.email, "staff created");
    Ok(member)
  }

  /// `staff/update` storing the password as given.
  pub async fn update_staff(&self, input: StaffInput) -> Result<StaffMember> {
    self.update_staff_sealed(input, |p| Ok(p.to_string())).await
  }

  /// `staff/update` by row number. A blank password keeps the stored one.
  pub async fn update_staff_sealed(
    &self,
    input: StaffInput,
    seal: impl FnOnce(&str) -> Result<String>,
  ) -> Result<StaffMember> {
    let row = check_row(input.row_number)?;
    let role = Self::validate_identity(&input)?;
    let new_password = if input.password.is_empty() {
      None
    } else {
      validate_password(&input.password)?;
      Some(seal(&input.password)?)
    };

    let _guard = self.master_lock.lock().await;
    let rows = self.staff_rows().await?;
    let existing = &rows[(row - col::FIRST_ROW) as usize];
    if cell(existing, col::NAME).is_empty() {
      return Err(Error::not_found("職員が見つかりません"));
    }
    Self::ensure_unique_email(&rows, &input.email, Some(row))?;

    let password = new_password.unwrap_or_else(|| existing[(col::PASSWORD - col::NAME) as usize].display());
    let cells = encode(&input, role, password);
    let member = decode(&cells, row);
    self.master.write_row(row, col::NAME, cells).await.map_err(storage)?;
    info!(row, email = %member.email, "staff updated");
    Ok(member)
  }

  /// `staff/delete`: blank the row's staff cells.
  pub async fn delete_staff(&self, row_number: u32) -> Result<()> {
    let row = check_row(Some(row_number))?;
    let _guard = self.master_lock.lock().await;
    let name = self.master.read(row, col::NAME).await.map_err(storage)?;
    if name.is_blank() {
      return Err(Error::not_found("職員が見つかりません"));
    }
    self.master.clear_row(row, col::NAME, col::WIDTH).await.map_err(storage)?;
    info!(row, "staff deleted");
    Ok(())
  }

  /// Login lookup by trimmed email. Retired staff carry `retired = true`.
  pub async fn staff_credential(&self, email: &str) -> Result<Option<StaffCredential>> {
    let email = email.trim();
    let rows = self.staff_rows().await?;
    Ok(rows.iter().find(|row| !email.is_empty() && cell(row, col::EMAIL) == email).map(|row| {
      let role = cell(row, col::ROLE);
      StaffCredential {
        name:     cell(row, col::NAME),
        email:    cell(row, col::EMAIL),
        role:     if role.is_empty() { DEFAULT_LOGIN_ROLE.to_string() } else { role },
        password: row[(col::PASSWORD - col::NAME) as usize].display(),
        retired:  !row[(col::RETIREMENT_DATE - col::NAME) as usize].is_blank(),
      }
    }))
  }
}
