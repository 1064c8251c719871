// handlers/protected/auditoria/history_get.rs - change history of one record or field

use axum::extract::{Path, State};

use super::require_auditor;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::CriticalLogView;

/// GET /api/v1/auditoria/registro/:tabla/:registro_id - newest first
pub async fn record_history_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tabla, registro_id)): Path<(String, i64)>,
) -> ApiResult<Vec<CriticalLogView>> {
    require_auditor(&auth)?;
    let history = state.audit.record_history(&tabla, registro_id).await?;
    Ok(ApiResponse::success(history))
}

/// GET /api/v1/auditoria/campo/:tabla/:registro_id/:campo - oldest first
pub async fn field_history_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tabla, registro_id, campo)): Path<(String, i64, String)>,
) -> ApiResult<Vec<CriticalLogView>> {
    require_auditor(&auth)?;
    let history = state.audit.field_history(&tabla, registro_id, &campo).await?;
    Ok(ApiResponse::success(history))
}
