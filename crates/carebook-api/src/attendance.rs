//! Handlers for `/attendance/*`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance/checkin` | 409 if the day's row exists |
//! | `POST` | `/attendance/checkout` | 404 without a check-in |
//! | `POST` | `/attendance/update` | creates the row when absent |
//! | `GET`  | `/attendance/daily/{date}` | recent window only |
//! | `GET`  | `/attendance/scheduled/{date}` | |
//! | `GET`  | `/attendance/user/{name}/{date}` | fast lookup; `record` may be null |
//! | `GET`  | `/attendance/search/{name}/{date}` | exhaustive lookup |
//! | `GET`  | `/attendance/history/{name}` | newest first |
//! | `GET`  | `/attendance/health-batch/{names}` | comma-separated names |

use axum::extract::{Path, State};
use carebook_core::{
  grid::Sheet,
  records::{AttendanceUpdate, CheckIn, CheckOut},
  scan::LocateMode,
};
use serde_json::json;

use crate::{ApiResult, ApiState, error::Payload, path_date, success};

// ─── Writes ──────────────────────────────────────────────────────────────────

/// `POST /attendance/checkin`
pub async fn check_in<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<CheckIn>) -> ApiResult {
  let record = state.facility.check_in(body, state.today()).await?;
  success(json!({
    "message":  "出勤を登録しました",
    "date":     record.date,
    "userName": record.user_name,
    "record":   record,
  }))
}

/// `POST /attendance/checkout`
pub async fn check_out<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<CheckOut>) -> ApiResult {
  let record = state.facility.check_out(body, state.today()).await?;
  success(json!({ "message": "退勤を登録しました", "record": record }))
}

/// `POST /attendance/update`
pub async fn update<S: Sheet>(
  State(state): State<ApiState<S>>,
  Payload(body): Payload<AttendanceUpdate>,
) -> ApiResult {
  let updated = state.facility.update_attendance(body).await?;
  success(json!({
    "message": "勤怠を更新しました",
    "rowId":   updated.record.row_number,
    "created": updated.created,
    "record":  updated.record,
  }))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /attendance/daily/{date}`
pub async fn daily<S: Sheet>(State(state): State<ApiState<S>>, Path(date): Path<String>) -> ApiResult {
  let records = state.facility.daily_attendance(path_date(&date)?).await?;
  success(json!({ "records": records }))
}

/// `GET /attendance/scheduled/{date}`
pub async fn scheduled<S: Sheet>(State(state): State<ApiState<S>>, Path(date): Path<String>) -> ApiResult {
  let users = state.facility.scheduled_users(path_date(&date)?).await?;
  success(json!({ "scheduledUsers": users }))
}

async fn one<S: Sheet>(state: &ApiState<S>, name: &str, date: &str, mode: LocateMode) -> ApiResult {
  let record = state.facility.user_attendance(name, path_date(date)?, mode).await?;
  success(json!({ "record": record }))
}

/// `GET /attendance/user/{name}/{date}`
pub async fn user_fast<S: Sheet>(
  State(state): State<ApiState<S>>,
  Path((name, date)): Path<(String, String)>,
) -> ApiResult {
  one(&state, &name, &date, LocateMode::Fast).await
}

/// `GET /attendance/search/{name}/{date}`
pub async fn user_exhaustive<S: Sheet>(
  State(state): State<ApiState<S>>,
  Path((name, date)): Path<(String, String)>,
) -> ApiResult {
  one(&state, &name, &date, LocateMode::Exhaustive).await
}

/// `GET /attendance/history/{name}`
pub async fn history<S: Sheet>(State(state): State<ApiState<S>>, Path(name): Path<String>) -> ApiResult {
  let records = state.facility.user_history(&name).await?;
  success(json!({ "records": records }))
}

/// `GET /attendance/health-batch/{names}`
pub async fn health_batch<S: Sheet>(State(state): State<ApiState<S>>, Path(names): Path<String>) -> ApiResult {
  let names: Vec<String> = names
    .split(',')
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .map(str::to_owned)
    .collect();
  let health = state.facility.health_history(&names).await?;
  success(json!({ "healthData": health }))
}
