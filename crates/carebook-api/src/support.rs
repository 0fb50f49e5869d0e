//! Handlers for `/support/*`: the manually entered half of a log row.

use axum::extract::{Path, State};
use carebook_core::{grid::Sheet, records::SupportInput, scan::LocateMode};
use serde_json::json;

use crate::{ApiResult, ApiState, error::Payload, path_date, success};

/// `POST /support/upsert`: 404 unless the day's attendance row exists.
pub async fn upsert<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<SupportInput>) -> ApiResult {
  let record = state.facility.upsert_support(body, state.today()).await?;
  success(json!({ "message": "支援記録を保存しました", "record": record }))
}

/// `GET /support/list/{date}`
pub async fn list<S: Sheet>(State(state): State<ApiState<S>>, Path(date): Path<String>) -> ApiResult {
  let records = state.facility.support_list(path_date(&date)?).await?;
  success(json!({ "records": records }))
}

async fn one<S: Sheet>(state: &ApiState<S>, date: &str, name: &str, mode: LocateMode) -> ApiResult {
  let record = state.facility.support_record(path_date(date)?, name.trim(), mode).await?;
  success(json!({ "record": record }))
}

/// `GET /support/get/{date}/{name}`
pub async fn get_fast<S: Sheet>(
  State(state): State<ApiState<S>>,
  Path((date, name)): Path<(String, String)>,
) -> ApiResult {
  one(&state, &date, &name, LocateMode::Fast).await
}

/// `GET /support/search/{date}/{name}`
pub async fn get_exhaustive<S: Sheet>(
  State(state): State<ApiState<S>>,
  Path((date, name)): Path<(String, String)>,
) -> ApiResult {
  one(&state, &date, &name, LocateMode::Exhaustive).await
}
