//! HTTP server wiring for Carebook: configuration, store opening and the
//! top-level router.

use std::path::PathBuf;

use axum::{Router, routing::get};
use carebook_api::{ApiSettings, ApiState, api_router};
use carebook_core::{SyncPolicy, scan::ScanConfig};
use carebook_store_sqlite::{SqliteSheet, SqliteStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CAREBOOK_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// Fiscal year whose log and roster sheets are served.
  pub fiscal_year:           i32,
  /// Create absent sheets on startup instead of refusing to start.
  pub create_missing_sheets: bool,
  pub sync_policy:           SyncPolicy,
  pub scan:                  ScanConfig,
  pub api:                   ApiSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_string(),
      port:                  8080,
      store_path:            PathBuf::from("carebook.db"),
      fiscal_year:           2025,
      create_missing_sheets: true,
      sync_policy:           SyncPolicy::default(),
      scan:                  ScanConfig::default(),
      api:                   ApiSettings::default(),
    }
  }
}

// ─── Application ─────────────────────────────────────────────────────────────

/// Bind the configured fiscal year's sheets in `store` into API state,
/// along with the fiscal years the store holds.
pub async fn open_state(
  store: &SqliteStore,
  cfg: &ServerConfig,
) -> carebook_store_sqlite::Result<ApiState<SqliteSheet>> {
  let facility = store
    .facility(cfg.fiscal_year, cfg.create_missing_sheets)
    .await?
    .with_scan_config(cfg.scan.clone())
    .with_sync_policy(cfg.sync_policy);
  let years = store.fiscal_years().await?;
  info!(fiscal_year = cfg.fiscal_year, sync_policy = ?cfg.sync_policy, ?years, "facility opened");
  Ok(ApiState::new(facility, cfg.api.clone()).with_fiscal_years(years))
}

/// The full application router: the API under `/api` plus a liveness check.
pub fn build_app(state: ApiState<SqliteSheet>) -> Router {
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cfg = ServerConfig {
      api: ApiSettings { today: chrono::NaiveDate::from_ymd_opt(2025, 6, 2), ..Default::default() },
      ..Default::default()
    };
    build_app(open_state(&store, &cfg).await.unwrap())
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
      None => builder.body(Body::empty()),
    }
    .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  #[tokio::test]
  async fn health_answers_ok() {
    let app = app().await;
    let resp = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_is_nested_and_backed_by_sqlite() {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/api/user/create", Some(json!({
      "name": "Taro", "furigana": "タロウ", "status": "契約中", "scheduledMon": "通所",
    })))
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = send(&app, "POST", "/api/attendance/checkin", Some(json!({ "userName": "Taro" }))).await;
    assert_eq!(body["date"], "2025-06-02");
    assert_eq!(body["record"]["scheduledAttendance"], "通所");

    let (_, body) = send(&app, "GET", "/api/attendance/daily/2025-06-02", None).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/user/list", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn billing_and_fiscal_years_come_from_the_store() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.create_sheet("名簿_2024").await.unwrap();
    let cfg = ServerConfig {
      api: ApiSettings { today: chrono::NaiveDate::from_ymd_opt(2025, 6, 2), ..Default::default() },
      ..Default::default()
    };
    let app = build_app(open_state(&store, &cfg).await.unwrap());

    let (_, body) = send(&app, "GET", "/api/fiscal-year/available", None).await;
    assert_eq!(body["availableYears"], json!([2025, 2024]));
    assert_eq!(body["activeYear"], 2025);

    let (status, body) = send(&app, "POST", "/api/billing/save-settings", Some(json!({
      "settings": { "businessName": "ひかり", "expense1": 500 },
    })))
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = send(&app, "GET", "/api/billing/settings", None).await;
    assert_eq!(body["businessName"], "ひかり");
    assert_eq!(body["expense1"], "500");
  }

  #[tokio::test]
  async fn missing_sheets_refused_without_create() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let cfg = ServerConfig { create_missing_sheets: false, ..Default::default() };
    assert!(matches!(
      open_state(&store, &cfg).await,
      Err(carebook_store_sqlite::Error::SheetNotFound(_))
    ));
  }

  #[test]
  fn config_defaults_fill_gaps() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str("port = 9000\n[scan]\nrecent_window = 50", config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.fiscal_year, 2025);
    assert_eq!(cfg.scan.recent_window, 50);
    assert_eq!(cfg.scan.history_limit, 50);
  }
}
