use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use super::{
    claims::TokenPair,
    dto::{LoginRequest, LogoutRequest, SignupRequest, SignupResponse},
};
use crate::{
    error::{AppError, AppResult, ErrorKind},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trim and lower-case. Empty input passes through so the service can
/// answer `InvalidCredentials`.
fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !email.is_empty() && !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::new(ErrorKind::InvalidInput, "invalid email"));
    }
    Ok(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let email = normalize_email(&payload.email)?;
    let (pair, user_id) = state
        .auth
        .signup(&email, &payload.password, payload.bot_name.trim())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let email = normalize_email(&payload.email)?;
    let pair = state.auth.login(&email, &payload.password).await?;
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> AppResult<StatusCode> {
    state.auth.logout(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}
