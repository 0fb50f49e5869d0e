//! Handlers for `/staff/*`.

use axum::extract::State;
use carebook_core::{grid::Sheet, records::StaffInput};
use serde::Deserialize;
use serde_json::json;

use crate::{ApiResult, ApiState, auth::hash_password, error::Payload, success};

/// Body of every row-addressed delete.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRef {
  pub row_number: u32,
}

/// `GET /staff/list`
pub async fn list<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let staff = state.facility.list_staff().await?;
  success(json!({ "staffList": staff }))
}

/// `POST /staff/create`
pub async fn create<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<StaffInput>) -> ApiResult {
  let staff = if state.settings.hash_new_passwords {
    state.facility.create_staff_sealed(body, hash_password).await?
  } else {
    state.facility.create_staff(body).await?
  };
  success(json!({ "staff": staff, "message": "職員を登録しました" }))
}

/// `POST /staff/update`: a blank password keeps the stored one.
pub async fn update<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<StaffInput>) -> ApiResult {
  let staff = if state.settings.hash_new_passwords {
    state.facility.update_staff_sealed(body, hash_password).await?
  } else {
    state.facility.update_staff(body).await?
  };
  success(json!({ "staff": staff, "message": "職員情報を更新しました" }))
}

/// `POST /staff/delete`
pub async fn delete<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<RowRef>) -> ApiResult {
  state.facility.delete_staff(body.row_number).await?;
  success(json!({ "message": "職員を削除しました" }))
}
