use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::auth::AccessLevel;
use crate::error::ApiError;
use crate::tenant::{TenantContext, TenantError, TenantId};

/// Resolve the tenant from the JWT claim and run the rest of the request inside its context.
///
/// The tenant must exist and be active in the directory. The context is
/// cleared when the request future completes, fails or is dropped.
pub async fn tenant_context_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant validation"))?;

    let Some(raw_id) = auth_user.tenant_id else {
        tracing::warn!("Tenant validation failed: token for '{}' carries no tenant", auth_user.email);
        return Err(ApiError::forbidden("Token does not identify a tenant"));
    };
    let tenant_id = TenantId::try_from(raw_id)?;

    let tenant = state.directory.find_tenant(tenant_id).await.map_err(|e| {
        tracing::error!("Directory error validating tenant {}: {}", tenant_id, e);
        ApiError::service_unavailable("Failed to validate tenant")
    })?;

    match tenant {
        Some(tenant) if tenant.active => {
            tracing::debug!("Tenant validation successful: {} ({})", tenant.name, tenant.id);
        }
        _ => {
            tracing::warn!("Tenant validation failed: tenant {} not found or inactive", tenant_id);
            return Err(TenantError::NotActive(raw_id).into());
        }
    }

    Ok(TenantContext::with_tenant(tenant_id, next.run(request)).await?)
}

/// Gate for cross-tenant administration: root access, empty tenant context
pub async fn elevated_scope_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required"))?;

    auth_user.require_access(AccessLevel::Root)?;

    Ok(TenantContext::scope(next.run(request)).await)
}
