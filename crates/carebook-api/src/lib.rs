//! JSON API for Carebook.
//!
//! Exposes an axum [`Router`] backed by a [`Facility`] over any
//! [`Sheet`] implementation. Every action answers with the envelope
//! `{"success": true, ...payload}` or
//! `{"success": false, "message": ..., "kind": ...}`.
//! TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", carebook_api::api_router(state))
//! ```

pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod billing;
pub mod error;
pub mod master;
pub mod staff;
pub mod support;
pub mod users;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use carebook_core::{Error as CoreError, Facility, codec, grid::Sheet};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Behaviour switches for the API layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
  /// Store new and changed staff passwords as argon2 PHC strings.
  pub hash_new_passwords: bool,
  /// Fixed "today" for date defaults; the local date when unset.
  pub today:              Option<NaiveDate>,
}

/// Shared state threaded through all handlers.
pub struct ApiState<S: Sheet> {
  pub facility:     Arc<Facility<S>>,
  pub settings:     Arc<ApiSettings>,
  /// Fiscal years with sheets in the backing store.
  pub fiscal_years: Arc<Vec<i32>>,
}

impl<S: Sheet> ApiState<S> {
  pub fn new(facility: Facility<S>, settings: ApiSettings) -> Self {
    Self { facility: Arc::new(facility), settings: Arc::new(settings), fiscal_years: Arc::default() }
  }

  pub fn with_fiscal_years(mut self, years: Vec<i32>) -> Self {
    self.fiscal_years = Arc::new(years);
    self
  }

  pub fn today(&self) -> NaiveDate { self.settings.today.unwrap_or_else(|| Local::now().date_naive()) }
}

impl<S: Sheet> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      facility:     self.facility.clone(),
      settings:     self.settings.clone(),
      fiscal_years: self.fiscal_years.clone(),
    }
  }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

pub type ApiResult = Result<Json<Value>, ApiError>;

/// Wrap `payload` in the success envelope. Objects are flattened into it;
/// anything else lands under `data`.
pub fn success<T: Serialize>(payload: T) -> ApiResult {
  let mut body = match serde_json::to_value(payload)? {
    Value::Object(map) => map,
    Value::Null => serde_json::Map::new(),
    other => serde_json::Map::from_iter([("data".to_owned(), other)]),
  };
  body.insert("success".to_owned(), Value::Bool(true));
  Ok(Json(Value::Object(body)))
}

/// A date taken from a path segment.
pub(crate) fn path_date(raw: &str) -> Result<NaiveDate, ApiError> {
  codec::parse_date_str(raw)
    .ok_or_else(|| CoreError::validation(format!("日付の形式が正しくありません: {raw}")).into())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: Sheet + 'static,
{
  Router::new()
    // Master settings
    .route("/master/users", get(master::users::<S>))
    .route("/master/all-users", get(master::all_users::<S>))
    .route("/master/dropdowns", get(master::dropdowns::<S>))
    .route("/master/evaluation-alerts", get(master::evaluation_alerts::<S>))
    // Staff
    .route("/staff/list", get(staff::list::<S>))
    .route("/staff/create", post(staff::create::<S>))
    .route("/staff/update", post(staff::update::<S>))
    .route("/staff/delete", post(staff::delete::<S>))
    .route("/auth/staff/login", post(auth::login::<S>))
    // Users
    .route("/user/list", get(users::list::<S>))
    .route("/user/create", post(users::create::<S>))
    .route("/user/update", post(users::update::<S>))
    .route("/user/change-status", post(users::change_status::<S>))
    .route("/user/delete", post(users::delete::<S>))
    // Attendance
    .route("/attendance/checkin", post(attendance::check_in::<S>))
    .route("/attendance/checkout", post(attendance::check_out::<S>))
    .route("/attendance/update", post(attendance::update::<S>))
    .route("/attendance/daily/{date}", get(attendance::daily::<S>))
    .route("/attendance/scheduled/{date}", get(attendance::scheduled::<S>))
    .route("/attendance/user/{name}/{date}", get(attendance::user_fast::<S>))
    .route("/attendance/search/{name}/{date}", get(attendance::user_exhaustive::<S>))
    .route("/attendance/history/{name}", get(attendance::history::<S>))
    .route("/attendance/health-batch/{names}", get(attendance::health_batch::<S>))
    // Support records
    .route("/support/upsert", post(support::upsert::<S>))
    .route("/support/list/{date}", get(support::list::<S>))
    .route("/support/get/{date}/{name}", get(support::get_fast::<S>))
    .route("/support/search/{date}/{name}", get(support::get_exhaustive::<S>))
    // Analytics
    .route("/analytics/facility-stats", get(analytics::facility_stats::<S>))
    .route("/analytics/facility-stats/{month}", get(analytics::facility_stats_for::<S>))
    .route("/analytics/weekly-schedule", get(analytics::weekly_schedule::<S>))
    .route("/analytics/user-stats/{name}", get(analytics::user_stats::<S>))
    .route("/analytics/departed-users", get(analytics::departed_users::<S>))
    .route("/analytics/departed-users/{month}", get(analytics::departed_users_for::<S>))
    .route("/analytics/yearly-stats", get(analytics::yearly_stats::<S>))
    .route("/analytics/yearly-stats/{fiscal_year}", get(analytics::yearly_stats_for::<S>))
    .route("/analytics/batch", get(analytics::batch::<S>))
    .route("/analytics/batch/{month}", get(analytics::batch_for::<S>))
    // Billing capture
    .route("/billing/dropdowns", get(billing::dropdowns::<S>))
    .route("/billing/settings", get(billing::settings::<S>))
    .route("/billing/save-settings", post(billing::save_settings::<S>))
    .route("/billing/monthly-users", get(billing::monthly_users::<S>))
    .route("/billing/monthly-users/{month}", get(billing::monthly_users_for::<S>))
    .route("/municipality/list", get(billing::municipalities::<S>))
    .route("/municipality/add", post(billing::add_municipality::<S>))
    .route("/municipality/delete", post(billing::delete_municipality::<S>))
    .route("/fiscal-year/available", get(billing::fiscal_years::<S>))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────
