//! Support records: the manually entered block of a log row.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
  Error, Facility, Result,
  cell::CellValue,
  codec,
  error::storage,
  grid::Sheet,
  records::{SupportInput, SupportRecord},
  scan::{LocateMode, RowKey, locate},
  schema::LogColumn as C,
};

impl<S: Sheet> Facility<S> {
  /// `support/upsert`: write the manual block of the (date, name) row.
  ///
  /// The row must already exist. A fast lookup is tried first and the whole
  /// log is searched when it misses, since support records are often entered
  /// days after the check-in.
  pub async fn upsert_support(&self, input: SupportInput, today: NaiveDate) -> Result<SupportRecord> {
    let name = input.user_name.trim();
    if name.is_empty() {
      return Err(Error::validation("利用者名を入力してください"));
    }
    let date = input.date.unwrap_or(today);
    let key = RowKey::new(date, name);

    let _guard = self.log_lock.lock().await;
    let row = match locate(&self.log, &key, LocateMode::Fast, &self.scan).await.map_err(storage)? {
      Some(row) => row,
      None => {
        debug!(name, %date, "fast lookup missed, searching whole log");
        locate(&self.log, &key, LocateMode::Exhaustive, &self.scan)
          .await
          .map_err(storage)?
          .ok_or_else(|| Error::not_found("該当する記録が見つかりません"))?
      }
    };

    let mut cells = self.read_log_row(row).await?;
    let texts = [
      (C::UserStatus, &input.user_status),
      (C::WorkLocation, &input.work_location),
      (C::Recorder, &input.recorder),
      (C::WorkGoal, &input.work_goal),
      (C::WorkEval, &input.work_eval),
      (C::EmploymentEval, &input.employment_eval),
      (C::WorkMotivation, &input.work_motivation),
      (C::Communication, &input.communication),
      (C::Evaluation, &input.evaluation),
      (C::UserFeedback, &input.user_feedback),
    ];
    for (col, value) in texts {
      cells[col.idx()] = codec::text_cell(value.as_deref());
    }
    cells[C::HomeSupportEval.idx()] = codec::flag_cell(input.home_support_eval);
    cells[C::ExternalEval.idx()] = codec::flag_cell(input.external_eval);

    let block: Vec<CellValue> = cells[C::UserStatus.idx()..].to_vec();
    self.log.write_row(row, C::UserStatus.col(), block).await.map_err(storage)?;

    info!(name, %date, row, "support record saved");
    Ok(codec::decode_support(&cells, row))
  }

  /// `support/list/{date}`: full rows for the date from the recent window.
  pub async fn support_list(&self, date: NaiveDate) -> Result<Vec<SupportRecord>> {
    let rows = self.recent_rows_on(date).await?;
    Ok(rows.iter().map(|(row, cells)| codec::decode_support(cells, *row)).collect())
  }

  /// `support/get/{date}/{name}` (fast) and `support/search/{date}/{name}`
  /// (exhaustive).
  pub async fn support_record(
    &self,
    date: NaiveDate,
    name: &str,
    mode: LocateMode,
  ) -> Result<Option<SupportRecord>> {
    let key = RowKey::new(date, name);
    let Some(row) = locate(&self.log, &key, mode, &self.scan).await.map_err(storage)? else {
      return Ok(None);
    };
    let cells = self.read_log_row(row).await?;
    Ok(Some(codec::decode_support(&cells, row)))
  }
}
