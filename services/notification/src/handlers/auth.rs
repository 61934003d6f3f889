//! Account registration and session sign-in/out.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use stratus_utils::{validate_model, validate_password_strength, NotifyError, NotifyResult};

use crate::extractors::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
}

impl AuthResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<impl IntoResponse, NotifyError> {
    validate_model(&request)?;

    let password_hash = hash_password(&request.password)?;
    let user = state.users.create(&request.email, &password_hash).await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User registered successfully.")),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<AuthRequest>,
) -> Result<impl IntoResponse, NotifyError> {
    validate_model(&request)?;

    let user = state
        .users
        .find_by_email(&request.email)
        .await?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| NotifyError::authentication("Incorrect email or password"))?;

    let token = Uuid::new_v4().simple().to_string();
    state
        .sessions
        .create(&token, user.id, state.config.auth.session_ttl_seconds)
        .await?;
    tracing::info!(user_id = %user.id, "user signed in");

    let jar = jar.add(session_cookie(token, &state));
    Ok((jar, Json(AuthResponse::new("Logged in successfully"))))
}

pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, NotifyError> {
    if let Some(cookie) = jar.get(&state.config.auth.session_cookie_name) {
        state.sessions.delete(cookie.value()).await?;
    }
    tracing::info!(user_id = %user.id, "user signed out");

    let jar = jar.remove(expired_session_cookie(&state));
    Ok((jar, Json(AuthResponse::new("Logged out successfully"))))
}

fn session_cookie(token: String, state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.auth.session_cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.auth.cookie_secure)
        .max_age(time::Duration::seconds(
            state.config.auth.session_ttl_seconds as i64,
        ))
        .build()
}

fn expired_session_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.auth.session_cookie_name.clone(), ""))
        .path("/")
        .build()
}

fn hash_password(password: &str) -> NotifyResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| NotifyError::internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
