//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

use stratus_models::User;
use stratus_utils::NotifyError;

use crate::AppState;

/// The signed-in user behind the request's session cookie.
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = NotifyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.config.auth.session_cookie_name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| NotifyError::authentication("Missing session cookie"))?;

        let user_id = state
            .sessions
            .find_user_id(&token)
            .await?
            .ok_or_else(|| NotifyError::authentication("Invalid or expired session"))?;

        let user = state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| NotifyError::authentication("User not found"))?;

        Ok(Self(user))
    }
}
