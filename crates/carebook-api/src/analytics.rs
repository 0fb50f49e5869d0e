//! Handlers for `/analytics/*`. A missing month or fiscal year means the one
//! containing today.

use axum::extract::{Path, State};
use carebook_core::{
  Error as CoreError,
  analytics::{Month, fiscal_year_of},
  grid::Sheet,
};

use crate::{ApiResult, ApiState, success};

fn month_or_current<S: Sheet>(state: &ApiState<S>, raw: Option<&str>) -> Result<Month, CoreError> {
  match raw {
    Some(raw) => raw.parse(),
    None => Ok(Month::of(state.today())),
  }
}

// ─── Facility stats ──────────────────────────────────────────────────────────

async fn facility_stats_in<S: Sheet>(state: &ApiState<S>, month: Option<&str>) -> ApiResult {
  let month = month_or_current(state, month)?;
  success(state.facility.facility_stats(month, state.today()).await?)
}

/// `GET /analytics/facility-stats`
pub async fn facility_stats<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  facility_stats_in(&state, None).await
}

/// `GET /analytics/facility-stats/{month}`
pub async fn facility_stats_for<S: Sheet>(State(state): State<ApiState<S>>, Path(month): Path<String>) -> ApiResult {
  facility_stats_in(&state, Some(&month)).await
}

/// `GET /analytics/weekly-schedule`
pub async fn weekly_schedule<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  success(state.facility.weekly_schedule().await?)
}

/// `GET /analytics/user-stats/{name}`: the current month only.
pub async fn user_stats<S: Sheet>(State(state): State<ApiState<S>>, Path(name): Path<String>) -> ApiResult {
  success(state.facility.user_stats(name.trim(), state.today()).await?)
}

// ─── Departures ──────────────────────────────────────────────────────────────

async fn departed_in<S: Sheet>(state: &ApiState<S>, month: Option<&str>) -> ApiResult {
  let month = month_or_current(state, month)?;
  success(state.facility.departed_users(month).await?)
}

/// `GET /analytics/departed-users`
pub async fn departed_users<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult {
  departed_in(&state, None).await
}

/// `GET /analytics/departed-users/{month}`
pub async fn departed_users_for<S: Sheet>(State(state): State<ApiState<S>>, Path(month): Path<String>) -> ApiResult {
  departed_in(&state, Some(&month)).await
}

// ─── Yearly ──────────────────────────────────────────────────────────────────

async fn yearly_in<S: Sheet>(state: &ApiState<S>, fiscal_year: Option<&str>) -> ApiResult {
  let fiscal_year = match fiscal_year.map(str::trim) {
    Some(raw) => raw
      .parse::<i32>()
      .ok()
      .filter(|y| (1900..=9999).contains(y))
      .ok_or_else(|| CoreError::validation(format!("年度が正しくありません: {raw}")))?,
    None => fiscal_year_of(state.today()),
  };
  success(state.facility.yearly_stats(fiscal_year).await?)
}

/// `GET /analytics/yearly-stats`
pub async fn yearly_stats<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult { yearly_in(&state, None).await }

/// `GET /analytics/yearly-stats/{fiscal_year}`
pub async fn yearly_stats_for<S: Sheet>(
  State(state): State<ApiState<S>>,
  Path(fiscal_year): Path<String>,
) -> ApiResult {
  yearly_in(&state, Some(&fiscal_year)).await
}

// ─── Batch ───────────────────────────────────────────────────────────────────

async fn batch_in<S: Sheet>(state: &ApiState<S>, month: Option<&str>) -> ApiResult {
  let month = month_or_current(state, month)?;
  success(state.facility.analytics_batch(month, state.today()).await?)
}

/// `GET /analytics/batch`
pub async fn batch<S: Sheet>(State(state): State<ApiState<S>>) -> ApiResult { batch_in(&state, None).await }

/// `GET /analytics/batch/{month}`
pub async fn batch_for<S: Sheet>(State(state): State<ApiState<S>>, Path(month): Path<String>) -> ApiResult {
  batch_in(&state, Some(&month)).await
}
