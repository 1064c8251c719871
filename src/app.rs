use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{AppConfig, StoreBackend};
use crate::database::{AuditStore, DatabaseError, DatabaseManager, MemoryAuditStore, PgAuditStore, TenantDirectory};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{elevated_scope_middleware, jwt_auth_middleware, tenant_context_middleware};
use crate::scheduler::SchedulerHandle;
use crate::services::{AuditArchiver, AuditService};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub audit: AuditService,
    pub directory: Arc<dyn TenantDirectory>,
    pub scheduler: SchedulerHandle,
}

impl AppState {
    /// Wire the audit service, archiver and scheduler handle over one backend
    pub fn from_store<S>(store: Arc<S>, retention_months: u32) -> Self
    where
        S: AuditStore + TenantDirectory + 'static,
    {
        let audit = AuditService::new(store.clone(), retention_months);
        let directory: Arc<dyn TenantDirectory> = store;
        let archiver = AuditArchiver::new(directory.clone(), audit.clone());

        Self {
            audit,
            directory,
            scheduler: SchedulerHandle::new(Arc::new(archiver)),
        }
    }
}

/// Open the configured backend and build the application state on top of it
pub async fn state_from_config(config: &AppConfig) -> Result<AppState, DatabaseError> {
    let retention_months = config.audit.retention_months;

    match config.database.backend {
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            Ok(AppState::from_store(Arc::new(PgAuditStore::new(pool)), retention_months))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory audit store; records are lost on restart");
            Ok(AppState::from_store(Arc::new(MemoryAuditStore::new()), retention_months))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected: JWT + tenant context
        .merge(audit_routes(state.clone()))
        // Elevated: root JWT, no tenant
        .merge(admin_routes())
        .with_state(state)
}

fn audit_routes(state: AppState) -> Router<AppState> {
    use protected::auditoria;

    Router::new()
        .route(
            "/api/v1/auditoria/simple",
            get(auditoria::simple_get).post(auditoria::simple_post),
        )
        .route("/api/v1/auditoria/critica", get(auditoria::critica_get))
        .route(
            "/api/v1/auditoria/registro/:tabla/:registro_id",
            get(auditoria::record_history_get),
        )
        .route(
            "/api/v1/auditoria/campo/:tabla/:registro_id/:campo",
            get(auditoria::field_history_get),
        )
        .route("/api/v1/auditoria/logins/:usuario_id", get(auditoria::logins_get))
        .route("/api/v1/auditoria/archivar", post(auditoria::archive_post))
        .route_layer(from_fn_with_state(state, tenant_context_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/auditoria/archivar", post(elevated::archive::archive_all_post))
        .route_layer(from_fn(elevated_scope_middleware))
        .route_layer(from_fn(jwt_auth_middleware))
}

/// CORS policy: explicit origins in production, permissive elsewhere
pub fn cors_layer() -> Option<CorsLayer> {
    let config = crate::config::config();
    if !config.security.enable_cors {
        return None;
    }

    if crate::is_production!() {
        let origins: Vec<HeaderValue> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        Some(CorsLayer::permissive())
    }
}
