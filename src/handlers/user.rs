use axum::{extract::State, Extension, Json};

use crate::error::{Flat, Result};
use crate::handlers::AppJson;
use crate::models::{CurrentUser, UpdateProfileRequest, UserResponse};
use crate::services::UserService;
use crate::AppState;

/// Get the signed-in account
/// GET /api/user/me
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Flat<UserResponse>>> {
    let profile = UserService::get_profile(&state.db, &current_user.id).await?;
    Ok(Json(Flat::new(profile)))
}

/// Update username and/or avatar
/// PATCH /api/user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<Json<Flat<UserResponse>>> {
    let profile = UserService::update_profile(&state.db, &current_user.id, req).await?;
    tracing::info!("Profile updated for {}", current_user.id);
    Ok(Json(Flat::new(profile)))
}
