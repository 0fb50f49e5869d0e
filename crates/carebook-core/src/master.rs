//! Master-sheet reads: users, dropdown option lists, evaluation alerts.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;

use crate::{
  Facility, Result,
  cell::CellValue,
  codec,
  error::storage,
  grid::Sheet,
  labels::UserStatus,
  records::MasterUser,
  scan::read_trailing,
  schema::{DROPDOWNS, LogColumn, OptionKind, user},
};

/// Reference option lists keyed by category.
pub type Dropdowns = BTreeMap<&'static str, Vec<String>>;

/// Which overdue evaluation an alert concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
  Home,
  External,
}

impl AlertKind {
  /// Days after the last evaluation before an alert is raised.
  pub fn due_after_days(self) -> i64 {
    match self {
      Self::Home => 7,
      Self::External => 14,
    }
  }

  fn label(self) -> &'static str {
    match self {
      Self::Home => "在宅支援評価",
      Self::External => "施設外評価",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationAlert {
  pub user_name:            String,
  pub alert_type:           AlertKind,
  pub message:              String,
  pub days_since_last_eval: i64,
  pub last_eval_date:       Option<String>,
}

#[derive(Default)]
struct EvalHistory {
  last_home:     Option<NaiveDate>,
  last_external: Option<NaiveDate>,
}

impl<S: Sheet> Facility<S> {
  /// Every named user row in the region. Deleted users leave blank rows
  /// anywhere in it, so blanks are skipped rather than ending the read.
  /// Rows without furigana are skipped; a blank status reads as active.
  pub(crate) async fn read_master_users(&self) -> Result<Vec<MasterUser>> {
    let rows = self
      .master
      .read_range(user::FIRST_ROW, user::NAME, user::ROWS, user::WIDTH)
      .await
      .map_err(storage)?;

    let mut users = Vec::new();
    for (offset, row) in rows.iter().enumerate() {
      let name = codec::text(&row[0]);
      if name.is_empty() {
        continue;
      }
      let furigana = codec::text(&row[(user::FURIGANA - 1) as usize]);
      if furigana.is_empty() {
        continue;
      }
      let status = codec::text(&row[(user::STATUS - 1) as usize]);
      let mut u = MasterUser {
        name,
        furigana,
        status: if status.is_empty() { UserStatus::Active.as_ref().to_string() } else { status },
        row_number: user::FIRST_ROW + offset as u32,
        ..Default::default()
      };
      u.set_schedule(std::array::from_fn(|d| {
        codec::text(&row[(user::SCHEDULE_MON - 1) as usize + d])
      }));
      users.push(u);
    }
    Ok(users)
  }

  /// `master/users`: users under contract.
  pub async fn active_users(&self) -> Result<Vec<MasterUser>> {
    let users = self.read_master_users().await?;
    Ok(users.into_iter().filter(|u| u.status == UserStatus::Active.as_ref()).collect())
  }

  /// `master/all-users`: every registered user regardless of status.
  pub async fn all_users(&self) -> Result<Vec<MasterUser>> { self.read_master_users().await }

  /// The scheduled-attendance label for `name` on `day`, if any.
  pub(crate) async fn scheduled_label(&self, name: &str, day: Weekday) -> Result<Option<String>> {
    let users = self.read_master_users().await?;
    Ok(
      users
        .into_iter()
        .find(|u| u.name == name)
        .map(|u| u.scheduled_on(day).to_string())
        .filter(|s| !s.is_empty()),
    )
  }

  /// `master/dropdowns`: every option region, blanks skipped.
  pub async fn dropdowns(&self) -> Result<Dropdowns> {
    let mut out = Dropdowns::new();
    for region in DROPDOWNS {
      let cells = crate::grid::read_column(
        &self.master,
        region.first_row,
        region.col,
        region.last_row - region.first_row + 1,
      )
      .await
      .map_err(storage)?;
      let options = cells
        .iter()
        .filter(|c| !c.is_blank())
        .map(|c| match (region.kind, c) {
          (OptionKind::TimeList, CellValue::DateTime(_)) => codec::opt_time(c).unwrap_or_default(),
          _ => c.display(),
        })
        .collect();
      out.insert(region.key, options);
    }
    Ok(out)
  }

  /// `master/evaluation-alerts`: overdue home-support and off-site
  /// evaluations as of `today`.
  ///
  /// Users with evaluation history in the recent log window alert once the
  /// last evaluation is older than [`AlertKind::due_after_days`]. Active users
  /// scheduled for home or off-site work who were never evaluated alert as
  /// needing a first evaluation.
  pub async fn evaluation_alerts(&self, today: NaiveDate) -> Result<Vec<EvaluationAlert>> {
    let users = self.active_users().await?;

    let mut history: BTreeMap<String, EvalHistory> = BTreeMap::new();
    if let Some((_, rows)) = read_trailing(&self.log, self.scan.history_window, LogColumn::ExternalEval.col(), &self.scan)
      .await
      .map_err(storage)?
    {
      for row in &rows {
        let name = codec::text(&row[LogColumn::UserName.idx()]);
        let Some(date) = codec::parse_date(&row[LogColumn::Date.idx()]) else { continue };
        if name.is_empty() {
          continue;
        }
        let entry = history.entry(name).or_default();
        if codec::flag(&row[LogColumn::HomeSupportEval.idx()]) {
          entry.last_home = entry.last_home.max(Some(date));
        }
        if codec::flag(&row[LogColumn::ExternalEval.idx()]) {
          entry.last_external = entry.last_external.max(Some(date));
        }
      }
    }

    let mut alerts = Vec::new();
    for (name, h) in &history {
      for (kind, last) in [(AlertKind::Home, h.last_home), (AlertKind::External, h.last_external)] {
        let Some(last) = last else { continue };
        let days = (today - last).num_days();
        if days >= kind.due_after_days() {
          alerts.push(EvaluationAlert {
            user_name:            name.clone(),
            alert_type:           kind,
            message:              format!("{}が{days}日間未入力です", kind.label()),
            days_since_last_eval: days,
            last_eval_date:       Some(codec::format_date(last)),
          });
        }
      }
    }

    for u in &users {
      let home = u.schedule().iter().any(|s| s.contains("在宅"));
      let external = u.schedule().iter().any(|s| s.contains("施設外"));
      let h = history.get(&u.name);
      for (kind, scheduled, evaluated) in [
        (AlertKind::Home, home, h.is_some_and(|h| h.last_home.is_some())),
        (AlertKind::External, external, h.is_some_and(|h| h.last_external.is_some())),
      ] {
        if scheduled && !evaluated {
          alerts.push(EvaluationAlert {
            user_name:            u.name.clone(),
            alert_type:           kind,
            message:              format!("{}が未実施です（初回評価が必要）", kind.label()),
            days_since_last_eval: 0,
            last_eval_date:       None,
          });
        }
      }
    }
    Ok(alerts)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveTime;

  use super::*;
  use crate::facility::testing::{date, facility, seed_user};

  const WEEK: [&str; 7] = ["通所", "通所", "在宅", "通所", "施設外", "", "非利用"];

  #[tokio::test]
  async fn users_past_a_blank_row_are_read() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "契約中", WEEK).await;
    seed_user(&f, 9, "佐藤花子", "退所済み", WEEK).await;
    seed_user(&f, 11, "鈴木一郎", "契約中", WEEK).await;
    seed_user(&f, 200, "高橋次郎", "契約中", WEEK).await;

    let all = f.all_users().await.unwrap();
    assert_eq!(all.len(), 4);
    let active = f.active_users().await.unwrap();
    let rows: Vec<u32> = active.iter().map(|u| u.row_number).collect();
    assert_eq!(rows, vec![8, 11, 200]);
    assert_eq!(active[0].name, "山田太郎");
    assert_eq!(active[0].scheduled_wed, "在宅");
  }

  #[tokio::test]
  async fn blank_status_reads_as_active() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "", WEEK).await;
    assert_eq!(f.active_users().await.unwrap()[0].status, "契約中");
  }

  #[tokio::test]
  async fn scheduled_label_by_weekday() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "契約中", WEEK).await;
    assert_eq!(f.scheduled_label("山田太郎", Weekday::Wed).await.unwrap().as_deref(), Some("在宅"));
    assert_eq!(f.scheduled_label("山田太郎", Weekday::Sat).await.unwrap(), None);
    assert_eq!(f.scheduled_label("誰か", Weekday::Mon).await.unwrap(), None);
  }

  #[tokio::test]
  async fn dropdowns_render_time_lists() {
    let f = facility();
    f.master.write(8, 14, CellValue::text("良好")).await.unwrap();
    f.master.write(10, 14, CellValue::text("普通")).await.unwrap();
    f.master
      .write(8, 18, CellValue::time(NaiveTime::from_hms_opt(1, 0, 0).unwrap()))
      .await
      .unwrap();
    f.master.write(9, 18, CellValue::text("0:45")).await.unwrap();

    let d = f.dropdowns().await.unwrap();
    assert_eq!(d["healthCondition"], vec!["良好", "普通"]);
    assert_eq!(d["lunchBreak"], vec!["01:00", "0:45"]);
    assert!(d["stress"].is_empty());
  }

  #[tokio::test]
  async fn evaluation_alerts_overdue_and_first_time() {
    let f = facility();
    seed_user(&f, 8, "山田太郎", "契約中", WEEK).await;
    seed_user(&f, 9, "佐藤花子", "契約中", ["通所"; 7]).await;

    // 山田: home evaluated 10 days ago, never evaluated off-site.
    let mut row = vec![CellValue::Empty; 31];
    row[0] = CellValue::text("2025-01-05");
    row[1] = CellValue::text("山田太郎");
    row[LogColumn::HomeSupportEval.idx()] = CellValue::text("○");
    f.log.write_row(2, 1, row).await.unwrap();

    let alerts = f.evaluation_alerts(date("2025-01-15")).await.unwrap();
    assert_eq!(alerts.len(), 2);
    let home = alerts.iter().find(|a| a.alert_type == AlertKind::Home).unwrap();
    assert_eq!(home.days_since_last_eval, 10);
    assert_eq!(home.last_eval_date.as_deref(), Some("2025-01-05"));
    let external = alerts.iter().find(|a| a.alert_type == AlertKind::External).unwrap();
    assert_eq!(external.last_eval_date, None);
    assert!(alerts.iter().all(|a| a.user_name == "山田太郎"));
  }
}
