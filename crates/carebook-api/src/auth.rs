//! Staff login and password sealing.
//!
//! Stored passwords are either plaintext or argon2 PHC strings; both verify.
//! The issued token is `base64(email:millis)` and is not checked anywhere.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::extract::State;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use carebook_core::{Error as CoreError, grid::Sheet};
use chrono::Utc;
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{ApiResult, ApiState, error::{ApiError, Payload}, success};

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, CoreError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| CoreError::Storage(e.to_string().into()))
}

/// Check `candidate` against a stored plaintext or PHC value.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
  if stored.starts_with("$argon2") {
    return PasswordHash::new(stored)
      .is_ok_and(|parsed| Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok());
  }
  stored.trim() == candidate.trim()
}

fn issue_token(email: &str) -> String {
  B64.encode(format!("{email}:{}", Utc::now().timestamp_millis()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/staff/login`
pub async fn login<S: Sheet>(State(state): State<ApiState<S>>, Payload(body): Payload<LoginBody>) -> ApiResult {
  let email = body.email.trim();
  if email.is_empty() || body.password.is_empty() {
    return Err(CoreError::validation("メールアドレスとパスワードを入力してください").into());
  }

  let Some(cred) = state.facility.staff_credential(email).await? else {
    warn!(email, "login for unknown email");
    return Err(ApiError::Unauthorized("メールアドレスが登録されていません".into()));
  };
  if cred.retired {
    warn!(email, "login for retired staff");
    return Err(ApiError::Unauthorized("このアカウントは無効です".into()));
  }
  if !verify_password(&cred.password, &body.password) {
    warn!(email, "login with wrong password");
    return Err(ApiError::Unauthorized("パスワードが正しくありません".into()));
  }

  info!(email, "staff logged in");
  success(json!({
    "staffName": cred.name,
    "email":     cred.email,
    "role":      cred.role,
    "token":     issue_token(&cred.email),
  }))
}
