// tenant/mod.rs - Tenant identity and per-request tenant context
//
// Every request that touches tenant data runs inside a TenantContext scope.
// The scope is opened by the tenant middleware, holds at most one TenantId,
// and disappears with the request future, so pooled worker threads never
// see a previous request's tenant.

pub mod context;
pub mod error;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use context::{ActiveTenant, MaintenanceScope, TenantContext, TenantGuard, TenantState};
pub use error::TenantError;

/// Opaque numeric identifier of one customer organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TenantId(i64);

impl TenantId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for TenantId {
    type Error = TenantError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(TenantError::InvalidId(value));
        }
        Ok(Self(value))
    }
}

impl From<TenantId> for i64 {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_ids() {
        assert!(matches!(TenantId::try_from(0), Err(TenantError::InvalidId(0))));
        assert!(matches!(TenantId::try_from(-3), Err(TenantError::InvalidId(-3))));
        assert_eq!(TenantId::try_from(42).unwrap().get(), 42);
    }

    #[test]
    fn deserializes_through_validation() {
        let id: TenantId = serde_json::from_str("7").unwrap();
        assert_eq!(id.get(), 7);
        assert!(serde_json::from_str::<TenantId>("0").is_err());
    }
}
