use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::database::entities::{
    ArchiveCount, AuditLogArchive, AuditLogCritical, AuditLogSimple, CriticalLogQuery, NewCriticalEntry,
    NewSimpleEntry, SimpleLogQuery, Tenant, ARCHIVE_KIND_CRITICAL, ARCHIVE_KIND_SIMPLE,
};
use crate::database::store::{AuditStore, StoreError, TenantDirectory};
use crate::tenant::{ActiveTenant, MaintenanceScope, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Active,
    Archived,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    tenants: BTreeMap<i64, Tenant>,
    simple: Vec<(AuditLogSimple, Disposition)>,
    critical: Vec<(AuditLogCritical, Disposition)>,
    archive: Vec<AuditLogArchive>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store for development and tests
#[derive(Clone, Default)]
pub struct MemoryAuditStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a tenant in the directory
    pub fn upsert_tenant(&self, id: TenantId, name: impl Into<String>, active: bool) {
        let tenant = Tenant {
            id: id.get(),
            name: name.into(),
            active,
        };
        self.lock().tenants.insert(id.get(), tenant);
    }

    /// Archived rows of one tenant, oldest original timestamp first
    pub fn archived_for(&self, id: TenantId) -> Vec<AuditLogArchive> {
        let mut rows: Vec<_> = self
            .lock()
            .archive
            .iter()
            .filter(|row| row.tenant_id == id.get())
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.original_at);
        rows
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn active_simple<'a>(
    state: &'a MemoryState,
    tenant: &ActiveTenant,
) -> impl Iterator<Item = &'a AuditLogSimple> + 'a {
    let tenant_id = tenant.id().get();
    state
        .simple
        .iter()
        .filter(move |(row, disposition)| row.tenant_id == tenant_id && *disposition == Disposition::Active)
        .map(|(row, _)| row)
}

fn active_critical<'a>(
    state: &'a MemoryState,
    tenant: &ActiveTenant,
) -> impl Iterator<Item = &'a AuditLogCritical> + 'a {
    let tenant_id = tenant.id().get();
    state
        .critical
        .iter()
        .filter(move |(row, disposition)| row.tenant_id == tenant_id && *disposition == Disposition::Active)
        .map(|(row, _)| row)
}

fn truncate<T>(mut rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit.filter(|l| *l > 0) {
        rows.truncate(limit as usize);
    }
    rows
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert_simple(&self, tenant: &ActiveTenant, entry: NewSimpleEntry) -> Result<AuditLogSimple, StoreError> {
        let mut state = self.lock();
        let row = AuditLogSimple {
            id: state.next_id(),
            tenant_id: tenant.id().get(),
            user_id: entry.user_id,
            user_email: entry.user_email,
            action: entry.action.as_str().to_string(),
            description: entry.description,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            metadata: entry.metadata,
            recorded_at: entry.recorded_at,
        };
        state.simple.push((row.clone(), Disposition::Active));
        Ok(row)
    }

    async fn insert_critical(
        &self,
        tenant: &ActiveTenant,
        entry: NewCriticalEntry,
    ) -> Result<AuditLogCritical, StoreError> {
        let mut state = self.lock();
        let row = AuditLogCritical {
            id: state.next_id(),
            tenant_id: tenant.id().get(),
            user_id: entry.user_id,
            user_email: entry.user_email,
            table_name: entry.table_name,
            record_id: entry.record_id,
            field: entry.field,
            old_value: entry.old_value,
            new_value: entry.new_value,
            operation: entry.operation.as_str().to_string(),
            reason: entry.reason,
            ip_address: entry.ip_address,
            recorded_at: entry.recorded_at,
        };
        state.critical.push((row.clone(), Disposition::Active));
        Ok(row)
    }

    async fn find_simple(&self, tenant: &ActiveTenant, query: &SimpleLogQuery) -> Result<Vec<AuditLogSimple>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<_> = active_simple(&state, tenant)
            .filter(|row| query.user_id.map_or(true, |id| row.user_id == Some(id)))
            .filter(|row| query.action.as_deref().map_or(true, |action| row.action == action))
            .filter(|row| row.recorded_at >= query.from && row.recorded_at <= query.to)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(truncate(rows, query.limit))
    }

    async fn find_critical(
        &self,
        tenant: &ActiveTenant,
        query: &CriticalLogQuery,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<_> = active_critical(&state, tenant)
            .filter(|row| query.user_id.map_or(true, |id| row.user_id == Some(id)))
            .filter(|row| query.table_name.as_deref().map_or(true, |table| row.table_name == table))
            .filter(|row| row.recorded_at >= query.from && row.recorded_at <= query.to)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(truncate(rows, query.limit))
    }

    async fn record_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<_> = active_critical(&state, tenant)
            .filter(|row| row.table_name == table_name && row.record_id == record_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(rows)
    }

    async fn field_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
        field: &str,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let state = self.lock();
        let mut rows: Vec<_> = active_critical(&state, tenant)
            .filter(|row| row.table_name == table_name && row.record_id == record_id && row.field == field)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.recorded_at);
        Ok(rows)
    }

    async fn last_logins(&self, tenant: &ActiveTenant, user_id: i64, limit: i64) -> Result<Vec<AuditLogSimple>, StoreError> {
        let state = self.lock();
        let login = crate::database::entities::AuditAction::Login.as_str();
        let mut rows: Vec<_> = active_simple(&state, tenant)
            .filter(|row| row.user_id == Some(user_id) && row.action == login)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(truncate(rows, Some(limit)))
    }

    async fn archive_aged(&self, tenant: &ActiveTenant, cutoff: DateTime<Utc>) -> Result<ArchiveCount, StoreError> {
        let tenant_id = tenant.id().get();
        let archived_at = Utc::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut count = ArchiveCount::default();
        let mut moved = Vec::new();

        for (row, disposition) in state.simple.iter_mut() {
            if row.tenant_id == tenant_id && row.recorded_at < cutoff && *disposition == Disposition::Active {
                *disposition = Disposition::Archived;
                count.simple += 1;
                moved.push(AuditLogArchive {
                    id: 0,
                    tenant_id,
                    kind: ARCHIVE_KIND_SIMPLE.to_string(),
                    data: json!({
                        "accion": row.action,
                        "descripcion": row.description,
                        "usuario_email": row.user_email,
                        "ip_address": row.ip_address,
                        "metadata": row.metadata,
                    }),
                    original_at: row.recorded_at,
                    archived_at,
                });
            }
        }

        for (row, disposition) in state.critical.iter_mut() {
            if row.tenant_id == tenant_id && row.recorded_at < cutoff && *disposition == Disposition::Active {
                *disposition = Disposition::Archived;
                count.critical += 1;
                moved.push(AuditLogArchive {
                    id: 0,
                    tenant_id,
                    kind: ARCHIVE_KIND_CRITICAL.to_string(),
                    data: json!({
                        "tabla": row.table_name,
                        "registro_id": row.record_id,
                        "campo": row.field,
                        "valor_anterior": row.old_value,
                        "valor_nuevo": row.new_value,
                        "operacion": row.operation,
                        "usuario_email": row.user_email,
                        "motivo": row.reason,
                    }),
                    original_at: row.recorded_at,
                    archived_at,
                });
            }
        }

        for mut row in moved {
            row.id = state.next_id();
            state.archive.push(row);
        }

        Ok(count)
    }
}

#[async_trait]
impl TenantDirectory for MemoryAuditStore {
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.lock().tenants.get(&id.get()).cloned())
    }

    async fn list_tenants(&self, scope: &MaintenanceScope) -> Result<Vec<Tenant>, StoreError> {
        tracing::debug!("Listing all tenants for job '{}'", scope.job());
        Ok(self.lock().tenants.values().cloned().collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
