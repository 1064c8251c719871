// handlers/protected/auditoria/simple.rs - GET/POST /api/v1/auditoria/simple

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::{require_auditor, with_default_limit};
use crate::app::AppState;
use crate::database::entities::AuditAction;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, RequestMeta};
use crate::services::{Actor, AuditFilters, SimpleLogView};

#[derive(Debug, Deserialize)]
pub struct RecordActionRequest {
    pub accion: AuditAction,
    pub descripcion: Option<String>,
    pub metadata: Option<Value>,
}

/// GET /api/v1/auditoria/simple - general actions of the current tenant, newest first
pub async fn simple_get(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filters): Query<AuditFilters>,
) -> ApiResult<Vec<SimpleLogView>> {
    require_auditor(&auth)?;
    let logs = state.audit.simple_logs(&with_default_limit(filters)).await?;
    Ok(ApiResponse::success(logs))
}

/// POST /api/v1/auditoria/simple - record an action performed by the caller
pub async fn simple_post(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Json(body): Json<RecordActionRequest>,
) -> ApiResult<SimpleLogView> {
    let actor = Actor {
        user_id: auth.user_id,
        email: Some(auth.email),
    };
    let row = state
        .audit
        .record_action(&actor, body.accion, body.descripcion, body.metadata, &meta)
        .await?;
    Ok(ApiResponse::created(SimpleLogView::from(row)))
}
