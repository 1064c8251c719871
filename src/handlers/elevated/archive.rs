// handlers/elevated/archive.rs - POST /api/v1/admin/auditoria/archivar

use axum::{extract::State, http::StatusCode};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::scheduler::RunOutcome;

/// Trigger the cross-tenant archival immediately
pub async fn archive_all_post(State(state): State<AppState>, auth: AuthUser) -> ApiResult<RunOutcome> {
    tracing::info!("Cross-tenant audit archival requested by {}", auth.email);

    match state.scheduler.run_once().await {
        RunOutcome::Failed(_) => Err(ApiError::service_unavailable("Audit archival failed")),
        outcome @ RunOutcome::Skipped => Ok(ApiResponse::with_status(outcome, StatusCode::ACCEPTED)),
        outcome => Ok(ApiResponse::success(outcome)),
    }
}
