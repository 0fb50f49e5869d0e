//! Billing capture: per-year billing settings, billing option lists, the
//! municipality list, the users billable in a month and the fiscal years the
//! store holds.
//!
//! Settings live one per row in column B of the `請求_{year}` sheet; the
//! option lists and municipalities live in the master sheet below row 60.
//! Producing the billing output itself happens outside this crate.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::{
  Error, Facility, Result,
  analytics::{Month, fiscal_year_of},
  cell::CellValue,
  codec::{self, FLAG_MARK},
  error::storage,
  grid::Sheet,
  labels::UserStatus,
  schema::{billing as layout, billing_sheet_name},
};

/// Accept a JSON string, number or null where a cell's text is expected.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(match serde_json::Value::deserialize(d)? {
    serde_json::Value::Null => String::new(),
    serde_json::Value::String(s) => s,
    other => other.to_string(),
  })
}

// ─── Settings ────────────────────────────────────────────────────────────────

/// The facility's billing settings, rows 3..=51 of the billing sheet.
///
/// Flags are stored as `○`. Rows 40..=44 hold values derived on the sheet
/// and are neither read nor written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillingSettings {
  #[serde(deserialize_with = "lenient_text")]
  pub service_year_month:             String,
  pub corporate_name:                 String,
  pub representative:                 String,
  pub business_name:                  String,
  pub abbreviation:                   String,
  pub manager:                        String,
  #[serde(deserialize_with = "lenient_text")]
  pub business_number:                String,
  #[serde(deserialize_with = "lenient_text")]
  pub postal_code:                    String,
  pub address:                        String,
  #[serde(deserialize_with = "lenient_text")]
  pub phone:                          String,
  #[serde(rename = "type")]
  pub service_type:                   String,
  pub wage_category:                  String,
  pub is_public:                      bool,
  pub region_category:                String,
  #[serde(deserialize_with = "lenient_text")]
  pub capacity:                       String,
  #[serde(deserialize_with = "lenient_text")]
  pub type_capacity:                  String,
  #[serde(deserialize_with = "lenient_text")]
  pub standard_unit:                  String,
  pub has_transition_support:         bool,
  #[serde(deserialize_with = "lenient_text")]
  pub transition_workers:             String,
  pub welfare_staff_addition:         String,
  pub severe_support:                 String,
  pub target_wage_instructor:         String,
  pub has_target_wage_achievement:    bool,
  pub severe_support2:                String,
  pub medical_cooperation:            String,
  pub transport_addition:             String,
  pub has_restraint_reduction:        bool,
  pub has_regional_life_support:      bool,
  pub over_capacity:                  String,
  pub employee_shortage:              String,
  pub service_manager_shortage:       String,
  pub has_short_time_reduction:       bool,
  pub has_info_disclosure_reduction:  bool,
  pub has_bcp_reduction:              bool,
  pub has_abuse_prevention_reduction: bool,
  pub visual_hearing_speech_support:  String,
  pub has_higher_brain_support:       bool,
  pub welfare_improvement:            String,
  pub is_designated_facility:         bool,
  pub invoice_position:               String,
  pub invoice_name:                   String,
  pub invoice_note:                   String,
  #[serde(deserialize_with = "lenient_text")]
  pub expense1:                       String,
  #[serde(deserialize_with = "lenient_text")]
  pub expense2:                       String,
}

/// One settings cell, or a derived row that is skipped.
enum Slot {
  Value(CellValue),
  Derived,
}

fn text_slot(s: &str) -> Slot { Slot::Value(CellValue::text(s.trim())) }

fn flag_slot(on: bool) -> Slot { Slot::Value(codec::flag_cell(on)) }

impl BillingSettings {
  /// The settings column top to bottom, starting at row 3.
  fn to_slots(&self) -> Vec<Slot> {
    let mut slots = vec![
      text_slot(&self.service_year_month),
      text_slot(&self.corporate_name),
      text_slot(&self.representative),
      text_slot(&self.business_name),
      text_slot(&self.abbreviation),
      text_slot(&self.manager),
      text_slot(&self.business_number),
      text_slot(&self.postal_code),
      text_slot(&self.address),
      text_slot(&self.phone),
      text_slot(&self.service_type),
      text_slot(&self.wage_category),
      flag_slot(self.is_public),
      text_slot(&self.region_category),
      text_slot(&self.capacity),
      text_slot(&self.type_capacity),
      text_slot(&self.standard_unit),
      flag_slot(self.has_transition_support),
      text_slot(&self.transition_workers),
      text_slot(&self.welfare_staff_addition),
      text_slot(&self.severe_support),
      text_slot(&self.target_wage_instructor),
      flag_slot(self.has_target_wage_achievement),
      text_slot(&self.severe_support2),
      text_slot(&self.medical_cooperation),
      text_slot(&self.transport_addition),
      flag_slot(self.has_restraint_reduction),
      flag_slot(self.has_regional_life_support),
      text_slot(&self.over_capacity),
      text_slot(&self.employee_shortage),
      text_slot(&self.service_manager_shortage),
      flag_slot(self.has_short_time_reduction),
      flag_slot(self.has_info_disclosure_reduction),
      flag_slot(self.has_bcp_reduction),
      flag_slot(self.has_abuse_prevention_reduction),
      text_slot(&self.visual_hearing_speech_support),
      flag_slot(self.has_higher_brain_support),
    ];
    slots.extend((0..5).map(|_| Slot::Derived));
    slots.extend([
      text_slot(&self.welfare_improvement),
      flag_slot(self.is_designated_facility),
      text_slot(&self.invoice_position),
      text_slot(&self.invoice_name),
      text_slot(&self.invoice_note),
      text_slot(&self.expense1),
      text_slot(&self.expense2),
    ]);
    slots
  }

  /// Decode the settings column read from row 3 down.
  fn from_column(cells: &[CellValue]) -> Self {
    let text = |row: u32| cells.get((row - layout::SETTINGS_FIRST_ROW) as usize).map(codec::text).unwrap_or_default();
    let flag = |row: u32| text(row) == FLAG_MARK;
    Self {
      service_year_month:             text(3),
      corporate_name:                 text(4),
      representative:                 text(5),
      business_name:                  text(6),
      abbreviation:                   text(7),
      manager:                        text(8),
      business_number:                text(9),
      postal_code:                    text(10),
      address:                        text(11),
      phone:                          text(12),
      service_type:                   text(13),
      wage_category:                  text(14),
      is_public:                      flag(15),
      region_category:                text(16),
      capacity:                       text(17),
      type_capacity:                  text(18),
      standard_unit:                  text(19),
      has_transition_support:         flag(20),
      transition_workers:             text(21),
      welfare_staff_addition:         text(22),
      severe_support:                 text(23),
      target_wage_instructor:         text(24),
      has_target_wage_achievement:    flag(25),
      severe_support2:                text(26),
      medical_cooperation:            text(27),
      transport_addition:             text(28),
      has_restraint_reduction:        flag(29),
      has_regional_life_support:      flag(30),
      over_capacity:                  text(31),
      employee_shortage:              text(32),
      service_manager_shortage:       text(33),
      has_short_time_reduction:       flag(34),
      has_info_disclosure_reduction:  flag(35),
      has_bcp_reduction:              flag(36),
      has_abuse_prevention_reduction: flag(37),
      visual_hearing_speech_support:  text(38),
      has_higher_brain_support:       flag(39),
      welfare_improvement:            text(45),
      is_designated_facility:         flag(46),
      invoice_position:               text(47),
      invoice_name:                   text(48),
      invoice_note:                   text(49),
      expense1:                       text(50),
      expense2:                       text(51),
    }
  }
}

/// `billing/save-settings` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaveBillingSettings {
  pub settings:    Option<BillingSettings>,
  /// Must name the bound fiscal year when given.
  pub fiscal_year: Option<i32>,
}

// ─── Option lists ────────────────────────────────────────────────────────────

/// Billing option lists, one per master column K..P.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDropdowns {
  #[serde(rename = "type")]
  pub service_type:           Vec<String>,
  pub wage_category:          Vec<String>,
  pub region_category:        Vec<String>,
  pub welfare_staff_addition: Vec<String>,
  pub transport_addition:     Vec<String>,
  pub welfare_improvement:    Vec<String>,
}

// ─── Municipalities ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Municipality {
  pub name: String,
  #[serde(deserialize_with = "lenient_text")]
  pub code: String,
}

impl Municipality {
  fn from_row(row: &[CellValue]) -> Self {
    let cell = |i: usize| row.get(i).map(codec::text).unwrap_or_default();
    Self { name: cell(0), code: cell(1) }
  }
}

fn is_blank_row(row: &[CellValue]) -> bool { row.iter().all(CellValue::is_blank) }

/// `municipality/delete` payload: the position in the list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MunicipalityRef {
  pub index: Option<i64>,
}

// ─── Monthly users ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUser {
  pub name:        String,
  pub furigana:    String,
  /// Left during the month itself.
  pub is_departed: bool,
}

// ─── Fiscal years ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalYears {
  /// Newest first.
  pub available_years:     Vec<i32>,
  /// The fiscal year containing today (April start).
  pub current_fiscal_year: i32,
  /// The year the running service is bound to.
  pub active_year:         i32,
  pub default_year:        i32,
}

impl FiscalYears {
  /// `years` are the fiscal years with sheets in the store; the active year
  /// is always listed.
  pub fn new(years: impl IntoIterator<Item = i32>, active_year: i32, today: NaiveDate) -> Self {
    let mut set: BTreeSet<i32> = years.into_iter().collect();
    set.insert(active_year);
    Self {
      available_years: set.into_iter().rev().collect(),
      current_fiscal_year: fiscal_year_of(today),
      active_year,
      default_year: active_year,
    }
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S: Sheet> Facility<S> {
  fn billing_sheet(&self) -> Result<&S> {
    self.billing.as_ref().ok_or_else(|| {
      Error::SheetNotFound(self.fiscal_year.map(billing_sheet_name).unwrap_or_else(|| "請求".to_owned()))
    })
  }

  /// `billing/get-settings`
  pub async fn billing_settings(&self) -> Result<BillingSettings> {
    let sheet = self.billing_sheet()?;
    let cells =
      crate::grid::read_column(sheet, layout::SETTINGS_FIRST_ROW, layout::SETTINGS_COL, layout::SETTINGS_ROWS)
        .await
        .map_err(storage)?;
    Ok(BillingSettings::from_column(&cells))
  }

  /// `billing/save-settings`: overwrite every settings row except the derived
  /// ones.
  pub async fn save_billing_settings(&self, input: SaveBillingSettings) -> Result<()> {
    let settings = input.settings.ok_or_else(|| Error::validation("設定データがありません"))?;
    if let (Some(requested), Some(bound)) = (input.fiscal_year, self.fiscal_year) {
      if requested != bound {
        return Err(Error::SheetNotFound(billing_sheet_name(requested)));
      }
    }
    let sheet = self.billing_sheet()?;

    let _guard = self.billing_lock.lock().await;
    for (offset, slot) in settings.to_slots().into_iter().enumerate() {
      if let Slot::Value(cell) = slot {
        sheet
          .write(layout::SETTINGS_FIRST_ROW + offset as u32, layout::SETTINGS_COL, cell)
          .await
          .map_err(storage)?;
      }
    }
    info!(fiscal_year = ?self.fiscal_year, "billing settings saved");
    Ok(())
  }

  /// `billing/get-dropdowns`: non-blank options per column, in sheet order.
  pub async fn billing_dropdowns(&self) -> Result<BillingDropdowns> {
    let rows = self
      .master
      .read_range(
        layout::DROPDOWN_FIRST_ROW,
        layout::DROPDOWN_FIRST_COL,
        layout::DROPDOWN_LAST_ROW - layout::DROPDOWN_FIRST_ROW + 1,
        layout::DROPDOWN_COLS,
      )
      .await
      .map_err(storage)?;
    let column = |i: usize| -> Vec<String> {
      rows.iter().filter_map(|r| r.get(i)).filter(|c| !c.is_blank()).map(CellValue::display).collect()
    };
    Ok(BillingDropdowns {
      service_type:           column(0),
      wage_category:          column(1),
      region_category:        column(2),
      welfare_staff_addition: column(3),
      transport_addition:     column(4),
      welfare_improvement:    column(5),
    })
  }

  async fn municipality_rows(&self) -> Result<Vec<Vec<CellValue>>> {
    self
      .master
      .read_range(
        layout::MUNICIPALITY_FIRST_ROW,
        layout::MUNICIPALITY_NAME,
        layout::MUNICIPALITY_ROWS,
        layout::MUNICIPALITY_WIDTH,
      )
      .await
      .map_err(storage)
  }

  /// `municipality/get`: the packed list, ending at the first empty pair.
  pub async fn municipalities(&self) -> Result<Vec<Municipality>> {
    let rows = self.municipality_rows().await?;
    Ok(rows.iter().take_while(|r| !is_blank_row(r)).map(|r| Municipality::from_row(r)).collect())
  }

  /// `municipality/add`: written to the first row with a blank name.
  pub async fn add_municipality(&self, input: Municipality) -> Result<Municipality> {
    let name = input.name.trim();
    if name.is_empty() {
      return Err(Error::validation("市町村名は必須です"));
    }
    let entry = Municipality { name: name.to_owned(), code: input.code.trim().to_owned() };

    let _guard = self.master_lock.lock().await;
    let rows = self.municipality_rows().await?;
    let offset = rows
      .iter()
      .position(|r| r.first().is_none_or(CellValue::is_blank))
      .ok_or_else(|| Error::conflict("登録可能な市町村数の上限に達しました"))?;
    let row = layout::MUNICIPALITY_FIRST_ROW + offset as u32;
    self
      .master
      .write_row(row, layout::MUNICIPALITY_NAME, vec![
        CellValue::text(entry.name.as_str()),
        CellValue::text(entry.code.as_str()),
      ])
      .await
      .map_err(storage)?;
    info!(row, name = %entry.name, "municipality added");
    Ok(entry)
  }

  /// `municipality/delete`: remove the entry at `index` and move the ones
  /// below it up a row.
  pub async fn delete_municipality(&self, target: MunicipalityRef) -> Result<Municipality> {
    let _guard = self.master_lock.lock().await;
    let rows = self.municipality_rows().await?;
    let index = target
      .index
      .and_then(|i| usize::try_from(i).ok())
      .filter(|&i| i < rows.len())
      .ok_or_else(|| Error::validation("削除対象のインデックスが無効です"))?;
    if is_blank_row(&rows[index]) {
      return Err(Error::not_found("指定された市町村が見つかりません"));
    }
    let removed = Municipality::from_row(&rows[index]);

    let last = rows.iter().rposition(|r| !is_blank_row(r)).unwrap_or(index);
    for i in index..last {
      self
        .master
        .write_row(layout::MUNICIPALITY_FIRST_ROW + i as u32, layout::MUNICIPALITY_NAME, rows[i + 1].clone())
        .await
        .map_err(storage)?;
    }
    self
      .master
      .clear_row(layout::MUNICIPALITY_FIRST_ROW + last as u32, layout::MUNICIPALITY_NAME, layout::MUNICIPALITY_WIDTH)
      .await
      .map_err(storage)?;
    info!(index, name = %removed.name, "municipality deleted");
    Ok(removed)
  }

  /// `billing/get-monthly-users`: roster users billable in `month`, in
  /// roster order.
  ///
  /// Users whose use starts after the month are skipped. Contracted users are
  /// listed; departed users are listed when they left in or after the month,
  /// flagged when they left during it. A departed user without a leave date
  /// is skipped.
  pub async fn monthly_users(&self, month: Month) -> Result<Vec<MonthlyUser>> {
    let (first, last) = (month.first_day(), month.last_day());
    let people = self.roster_people().await?;
    let users: Vec<_> = people
      .into_iter()
      .filter(|p| !p.use_start.is_some_and(|d| d > last))
      .filter_map(|p| {
        let is_departed = if p.status == <&str>::from(UserStatus::Active) {
          false
        } else if p.status == <&str>::from(UserStatus::Departed) {
          let left = p.leave_date.filter(|d| *d >= first)?;
          left <= last
        } else {
          return None;
        };
        Some(MonthlyUser { name: p.name, furigana: p.furigana, is_departed })
      })
      .collect();
    debug!(%month, count = users.len(), "monthly users");
    Ok(users)
  }
}
