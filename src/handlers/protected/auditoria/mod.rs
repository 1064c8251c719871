// handlers/protected/auditoria/mod.rs - Audit log endpoints (admin only)

mod archive_post;
mod critica_get;
mod history_get;
mod logins_get;
mod simple;

pub use archive_post::archive_post;
pub use critica_get::critica_get;
pub use history_get::{field_history_get, record_history_get};
pub use logins_get::logins_get;
pub use simple::{simple_get, simple_post};

use crate::auth::AccessLevel;
use crate::config;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::AuditFilters;

/// Audit trails are visible to tenant administrators and root
fn require_auditor(auth: &AuthUser) -> Result<(), ApiError> {
    auth.require_access(AccessLevel::Admin)
}

fn with_default_limit(mut filters: AuditFilters) -> AuditFilters {
    if filters.limit.is_none() {
        filters.limit = Some(config::config().api.default_query_limit);
    }
    filters
}
