use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::Config;
use crate::error::{ApiResponse, Flat, Result};
use crate::handlers::AppJson;
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::{GoogleAuthRequest, SigninRequest, SignupRequest, UserResponse};
use crate::services::AuthService;
use crate::AppState;

/// Session cookie carrying a freshly issued token
pub fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.cookie_secure())
        .path("/")
        .max_age(time::Duration::seconds(config.session_ttl_secs()))
        .build()
}

/// Register a new account
/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<impl IntoResponse> {
    AuthService::signup(&state.db, &state.config, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::<()>::success_message("User created successfully")),
    ))
}

/// Sign in with email and password
/// POST /api/auth/signin
pub async fn signin(
    State(state): State<AppState>,
    AppJson(req): AppJson<SigninRequest>,
) -> Result<impl IntoResponse> {
    let (user, token) = AuthService::signin(&state.db, &state.config, req).await?;
    let jar = CookieJar::new().add(session_cookie(&state.config, token));
    Ok((jar, Json(Flat::new(UserResponse::from(user)))))
}

/// Sign in with an identity asserted by Google
/// POST /api/auth/google
pub async fn google(
    State(state): State<AppState>,
    AppJson(req): AppJson<GoogleAuthRequest>,
) -> Result<impl IntoResponse> {
    let (user, token) = AuthService::google(&state.db, &state.config, req).await?;
    let jar = CookieJar::new().add(session_cookie(&state.config, token));
    Ok((jar, Json(Flat::new(UserResponse::from(user)))))
}

/// Clear the session cookie
/// POST /api/auth/signout
pub async fn signout() -> impl IntoResponse {
    let expired = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();

    (
        CookieJar::new().add(expired),
        Json(ApiResponse::<()>::success_message("User has been logged out!")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let mut config = Config::default();
        let cookie = session_cookie(&config, "tok".to_string());
        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
        assert_ne!(cookie.secure(), Some(true));

        config.server.environment = "production".to_string();
        assert_eq!(session_cookie(&config, "tok".into()).secure(), Some(true));
    }
}
