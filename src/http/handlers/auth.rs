//! Registration and login.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{password, policy, Role};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::store::{NewUser, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(input) = body?;

    let username = input.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }
    if !is_plausible_email(&input.email) {
        return Err(ApiError::bad_request("email is invalid"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let role = match input.role.as_deref().map(str::trim) {
        None | Some("") => Role::User,
        Some(raw) => Role::parse(raw).ok_or_else(|| ApiError::bad_request("unknown role"))?,
    };
    if !policy::can_register_as(role, state.config.auth.allow_admin_registration) {
        return Err(ApiError::Forbidden("admin registration is disabled".to_string()));
    }

    let password_hash = password::hash_blocking(input.password, state.config.auth.bcrypt_cost)
        .await
        .map_err(ApiError::internal)?;

    let new_user = NewUser {
        username: username.to_string(),
        email: input.email.trim().to_string(),
        password_hash,
        role,
    };

    match state.store.create_user(new_user) {
        Ok(user) => {
            tracing::info!(user_id = user.id, role = %user.role, "User registered");
            Ok((StatusCode::CREATED, Json(MessageResponse { message: "registered" })))
        }
        Err(StoreError::Conflict) => Err(ApiError::bad_request("email or username exists")),
        Err(e) => Err(e.into()),
    }
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(input) = body?;
    let invalid = || ApiError::Unauthenticated("invalid credentials".to_string());

    let user = state
        .store
        .find_user_by_email(input.email.trim())?
        .ok_or_else(invalid)?;

    let matches = password::verify_blocking(input.password, user.password_hash.clone())
        .await
        .map_err(ApiError::internal)?;
    if !matches {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(invalid());
    }

    let token = state
        .codec
        .issue(user.id, user.role)
        .map_err(ApiError::internal)?;

    Ok(Json(LoginResponse {
        token,
        expires_in: state.codec.ttl().as_secs(),
    }))
}

/// `local@domain.tld` with no whitespace and a dotted domain.
fn is_plausible_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}
