use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "access_token";

/// Session middleware.
/// Reads the session cookie (or a Bearer header), validates it and loads the account.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&request)
        .ok_or_else(|| AppError::Unauthorized("You are not authenticated!".to_string()))?;

    let claims = AuthService::validate_token(&token, &state.config)?;

    let (username, email): (String, String) =
        sqlx::query_as("SELECT username, email FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(state.db.pool())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    request.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        username,
        email,
    });

    Ok(next.run(request).await)
}

fn session_token(request: &Request) -> Option<String> {
    let jar = CookieJar::from_headers(request.headers());
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
