//! Handlers for billing capture: `/billing/*`, `/municipality/*` and
//! `/fiscal-year/available`.

use axum::extract::{Path, State};
use carebook_core::{
  analytics::{Month, fiscal_year_of},
  billing::{FiscalYears, Municipality, MunicipalityRef, SaveBillingSettings},
  grid::Sheet,
};
use serde_json::json;

use crate::{ApiResult, ApiState, error::Payload, success};

/// `GET /billing/dropdowns`
pub async fn dropdowns<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  success(state.facility.billing_dropdowns().await?)
}

/// `GET /billing/settings`
pub async fn settings<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  success(state.facility.billing_settings().await?)
}

/// `POST /billing/save-settings`
pub async fn save_settings<S: Sheet>(
  State(state): State<ApiState<S>>,
  Payload(body): Payload<SaveBillingSettings>,
) -> ApiResult {
  state.facility.save_billing_settings(body).await?;
  success(json!({ "message": "請求業務設定を保存しました" }))
}

async fn monthly_users_in<S: Sheet>(state: &ApiState<S>, month: Option<&str>) -> ApiResult {
  let month = match month {
    Some(raw) => raw.parse::<Month>()?,
    None => Month::of(state.today()),
  };
  let users = state.facility.monthly_users(month).await?;
  success(json!({ "users": users }))
}

/// `GET /billing/monthly-users`: the current month.
pub async fn monthly_users<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  monthly_users_in(&state, None).await
}

/// `GET /billing/monthly-users/{month}`
pub async fn monthly_users_for<S: Sheet>(State(state): State<ApiState<S>>, Path(month): Path<String>) -> ApiResult {
  monthly_users_in(&state, Some(&month)).await
}

// ─── Municipalities ──────────────────────────────────────────────────────────

/// `GET /municipality/list`
pub async fn municipalities<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let municipalities = state.facility.municipalities().await?;
  success(json!({ "municipalities": municipalities }))
}

/// `POST /municipality/add`
pub async fn add_municipality<S: Sheet>(
  State(state): State<ApiState<S>>,
  Payload(body): Payload<Municipality>,
) -> ApiResult {
  let municipality = state.facility.add_municipality(body).await?;
  success(json!({ "municipality": municipality, "message": "市町村を追加しました" }))
}

/// `POST /municipality/delete`
pub async fn delete_municipality<S: Sheet>(
  State(state): State<ApiState<S>>,
  Payload(body): Payload<MunicipalityRef>,
) -> ApiResult {
  let municipality = state.facility.delete_municipality(body).await?;
  success(json!({ "municipality": municipality, "message": "市町村を削除しました" }))
}

// ─── Fiscal years ────────────────────────────────────────────────────────────

/// `GET /fiscal-year/available`
pub async fn fiscal_years<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  let today = state.today();
  let active = state.facility.fiscal_year().unwrap_or_else(|| fiscal_year_of(today));
  success(FiscalYears::new(state.fiscal_years.iter().copied(), active, today))
}
