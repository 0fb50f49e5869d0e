//! Handlers for `/user/*`: users span the master sheet and the roster.

use axum::extract::State;
use carebook_core::{
  grid::Sheet,
  records::{StatusChange, UserInput},
};
use serde_json::json;

use crate::{ApiResult, ApiState, error::Payload, staff::RowRef, success};

/// `GET /user/list`
pub async fn list<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let users = state.facility.user_list().await?;
  success(json!({ "userList": users }))
}

/// `POST /user/create`
pub async fn create<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<UserInput>) -> ApiResult {
  let user = state.facility.create_user(body).await?;
  success(json!({ "user": user, "message": "利用者を登録しました" }))
}

/// `POST /user/update`
pub async fn update<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<UserInput>) -> ApiResult {
  let user = state.facility.update_user(body).await?;
  success(json!({ "user": user, "message": "利用者情報を更新しました" }))
}

/// `POST /user/change-status`
pub async fn change_status<S: Sheet>(
  State(state): State<ApiState<S>>,
  Payload(body): Payload<StatusChange>,
) -> ApiResult {
  let status = body.status.trim().to_owned();
  let leave_date = body.leave_date.clone().filter(|d| !d.trim().is_empty());
  state.facility.change_user_status(body).await?;
  success(json!({
    "status":    status,
    "leaveDate": leave_date,
    "message":   "契約状態を変更しました",
  }))
}

/// `POST /user/delete`
pub async fn delete<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<RowRef>) -> ApiResult {
  state.facility.delete_user(body.row_number).await?;
  success(json!({ "message": "利用者を削除しました" }))
}
