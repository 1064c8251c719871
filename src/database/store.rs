use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::database::entities::{
    ArchiveCount, AuditLogCritical, AuditLogSimple, CriticalLogQuery, NewCriticalEntry, NewSimpleEntry,
    SimpleLogQuery, Tenant,
};
use crate::tenant::{ActiveTenant, MaintenanceScope, TenantId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Tenant-scoped access to the audit tables.
///
/// Every operation takes the [`ActiveTenant`] of the calling unit of work and
/// applies it as a mandatory `tenant_id` equality predicate.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_simple(&self, tenant: &ActiveTenant, entry: NewSimpleEntry) -> Result<AuditLogSimple, StoreError>;

    async fn insert_critical(
        &self,
        tenant: &ActiveTenant,
        entry: NewCriticalEntry,
    ) -> Result<AuditLogCritical, StoreError>;

    /// Newest first
    async fn find_simple(&self, tenant: &ActiveTenant, query: &SimpleLogQuery) -> Result<Vec<AuditLogSimple>, StoreError>;

    /// Newest first
    async fn find_critical(
        &self,
        tenant: &ActiveTenant,
        query: &CriticalLogQuery,
    ) -> Result<Vec<AuditLogCritical>, StoreError>;

    /// All changes of one record, newest first
    async fn record_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
    ) -> Result<Vec<AuditLogCritical>, StoreError>;

    /// All changes of one field, oldest first
    async fn field_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
        field: &str,
    ) -> Result<Vec<AuditLogCritical>, StoreError>;

    async fn last_logins(&self, tenant: &ActiveTenant, user_id: i64, limit: i64) -> Result<Vec<AuditLogSimple>, StoreError>;

    /// Move active records older than `cutoff` to the archive.
    ///
    /// A record is only counted when this call is the one that archived it,
    /// so overlapping or repeated runs never double count.
    async fn archive_aged(&self, tenant: &ActiveTenant, cutoff: DateTime<Utc>) -> Result<ArchiveCount, StoreError>;
}

/// Global tenant registry
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError>;

    /// Every tenant, active or not; cross-tenant so it requires a maintenance scope
    async fn list_tenants(&self, scope: &MaintenanceScope) -> Result<Vec<Tenant>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
