use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use stratus_utils::NotifyError;

use crate::AppState;

/// Gates every API route behind the `x-api-key` header.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, NotifyError> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|header| header.to_str().ok());

    match api_key {
        Some(key) if key == state.config.auth.api_key => Ok(next.run(request).await),
        Some(_) => Err(NotifyError::authorization("Invalid API Key")),
        None => Err(NotifyError::authorization("API Key required")),
    }
}
