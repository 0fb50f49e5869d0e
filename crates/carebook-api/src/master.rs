//! Handlers for `/master/*`: read-only views of the master settings sheet.

use axum::extract::State;
use carebook_core::grid::Sheet;
use serde_json::json;
use tracing::debug;

use crate::{ApiResult, ApiState, success};

/// `GET /master/users`: users under contract.
pub async fn users<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let users = state.facility.active_users().await?;
  debug!(count = users.len(), "active users");
  success(json!({ "users": users }))
}

/// `GET /master/all-users`: every named user regardless of status.
pub async fn all_users<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let users = state.facility.all_users().await?;
  success(json!({ "users": users }))
}

/// `GET /master/dropdowns`
pub async fn dropdowns<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  success(state.facility.dropdowns().await?)
}

/// `GET /master/evaluation-alerts`
pub async fn evaluation_alerts<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let alerts = state.facility.evaluation_alerts(state.today()).await?;
  success(json!({ "alerts": alerts }))
}
