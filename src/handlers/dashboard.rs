use axum::{extract::State, Json};

use crate::error::{ApiResponse, Result};
use crate::models::DashboardStats;
use crate::services::DashboardService;
use crate::AppState;

/// Collection counts for the dashboard
/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<DashboardStats>>> {
    let stats = DashboardService::stats(&state.db).await?;
    Ok(Json(ApiResponse::success(stats)))
}
