// handlers/protected/auditoria/logins_get.rs - GET /api/v1/auditoria/logins/:usuario_id

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::require_auditor;
use crate::app::AppState;
use crate::config;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::SimpleLogView;

#[derive(Debug, Deserialize)]
pub struct LoginsQuery {
    pub limit: Option<i64>,
}

pub async fn logins_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(usuario_id): Path<i64>,
    Query(query): Query<LoginsQuery>,
) -> ApiResult<Vec<SimpleLogView>> {
    require_auditor(&auth)?;
    let limit = query
        .limit
        .unwrap_or(config::config().api.default_login_history_limit);
    let logins = state.audit.last_logins(usuario_id, limit).await?;
    Ok(ApiResponse::success(logins))
}
