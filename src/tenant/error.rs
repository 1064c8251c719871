use thiserror::Error;

/// Errors raised by the tenant context gate
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("No tenant resolved for the current request")]
    Unresolved,

    #[error("Tenant context accessed outside of a request scope")]
    OutsideScope,

    #[error("Invalid tenant id: {0}")]
    InvalidId(i64),

    #[error("Tenant {0} does not exist or is not active")]
    NotActive(i64),
}
