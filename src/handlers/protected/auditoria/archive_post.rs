// handlers/protected/auditoria/archive_post.rs - POST /api/v1/auditoria/archivar

use axum::extract::State;
use chrono::Utc;

use super::require_auditor;
use crate::app::AppState;
use crate::database::entities::ArchiveCount;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Archive the caller's own tenant now instead of waiting for the nightly run
pub async fn archive_post(State(state): State<AppState>, auth: AuthUser) -> ApiResult<ArchiveCount> {
    require_auditor(&auth)?;
    tracing::info!("Manual audit archival requested by {}", auth.email);
    let count = state.audit.archive_current_tenant(Utc::now()).await?;
    Ok(ApiResponse::success(count))
}
