// handlers/protected/auditoria/critica_get.rs - GET /api/v1/auditoria/critica

use axum::extract::{Query, State};

use super::{require_auditor, with_default_limit};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{AuditFilters, CriticalLogView};

pub async fn critica_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filters): Query<AuditFilters>,
) -> ApiResult<Vec<CriticalLogView>> {
    require_auditor(&auth)?;
    let logs = state.audit.critical_logs(&with_default_limit(filters)).await?;
    Ok(ApiResponse::success(logs))
}
