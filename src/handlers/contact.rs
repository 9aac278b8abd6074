use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::error::{ApiResponse, Result};
use crate::handlers::AppJson;
use crate::models::ContactRequest;
use crate::services::ContactService;
use crate::AppState;

/// POST /api/contact
pub async fn submit(
    State(state): State<AppState>,
    AppJson(req): AppJson<ContactRequest>,
) -> Result<impl IntoResponse> {
    ContactService::submit(&state.db, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::<()>::success_message("Message sent successfully")),
    ))
}
