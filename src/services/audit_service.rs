use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::database::entities::{
    ArchiveCount, AuditAction, AuditLogCritical, AuditLogSimple, AuditOperation, CriticalLogQuery, NewCriticalEntry,
    NewSimpleEntry, SimpleLogQuery,
};
use crate::database::store::{AuditStore, StoreError};
use crate::middleware::RequestMeta;
use crate::tenant::{TenantContext, TenantError};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

/// Who performed the audited action
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<i64>,
    pub email: Option<String>,
}

/// Optional filters for audit log listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilters {
    pub usuario_id: Option<i64>,
    pub tabla: Option<String>,
    pub accion: Option<String>,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// One field change of an audited record
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub table_name: String,
    pub record_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub operation: AuditOperation,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleLogView {
    pub id: i64,
    pub tenant_id: i64,
    pub usuario_id: Option<i64>,
    pub usuario_email: Option<String>,
    pub accion: String,
    pub accion_descripcion: Option<&'static str>,
    pub descripcion: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<Value>,
    pub fecha: DateTime<Utc>,
}

impl From<AuditLogSimple> for SimpleLogView {
    fn from(row: AuditLogSimple) -> Self {
        // Actions written by older clients may not be in the catalog
        let accion_descripcion = row.action.parse::<AuditAction>().ok().map(|a| a.description());
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            usuario_id: row.user_id,
            usuario_email: row.user_email,
            accion: row.action,
            accion_descripcion,
            descripcion: row.description,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata: row.metadata,
            fecha: row.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CriticalLogView {
    pub id: i64,
    pub tenant_id: i64,
    pub usuario_id: Option<i64>,
    pub usuario_email: Option<String>,
    pub tabla: String,
    pub registro_id: i64,
    pub campo: String,
    pub valor_anterior: Option<String>,
    pub valor_nuevo: Option<String>,
    pub operacion: String,
    pub operacion_descripcion: Option<&'static str>,
    pub motivo: Option<String>,
    pub ip_address: Option<String>,
    pub fecha: DateTime<Utc>,
}

impl From<AuditLogCritical> for CriticalLogView {
    fn from(row: AuditLogCritical) -> Self {
        let operacion_descripcion = row.operation.parse::<AuditOperation>().ok().map(|o| o.description());
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            usuario_id: row.user_id,
            usuario_email: row.user_email,
            tabla: row.table_name,
            registro_id: row.record_id,
            campo: row.field,
            valor_anterior: row.old_value,
            valor_nuevo: row.new_value,
            operacion: row.operation,
            operacion_descripcion,
            motivo: row.reason,
            ip_address: row.ip_address,
            fecha: row.recorded_at,
        }
    }
}

/// Tenant-scoped audit recording and queries.
///
/// Every operation resolves the tenant through [`TenantContext::require`] and
/// fails with [`TenantError`] when the current unit of work has none.
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn AuditStore>,
    retention_months: u32,
}

impl AuditService {
    pub fn new(store: Arc<dyn AuditStore>, retention_months: u32) -> Self {
        Self {
            store,
            retention_months,
        }
    }

    // ==================== RECORDING ====================

    pub async fn record_action(
        &self,
        actor: &Actor,
        action: AuditAction,
        description: Option<String>,
        metadata: Option<Value>,
        meta: &RequestMeta,
    ) -> Result<AuditLogSimple, AuditError> {
        let tenant = TenantContext::require()?;
        let entry = NewSimpleEntry {
            user_id: actor.user_id,
            user_email: actor.email.clone(),
            action,
            description,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            metadata,
            recorded_at: Utc::now(),
        };
        let row = self.store.insert_simple(&tenant, entry).await?;
        debug!("Simple audit entry recorded: {}", action);
        Ok(row)
    }

    pub async fn record_login(&self, email: &str, user_id: i64, meta: &RequestMeta) -> Result<AuditLogSimple, AuditError> {
        let actor = Actor {
            user_id: Some(user_id),
            email: Some(email.to_string()),
        };
        self.record_action(
            &actor,
            AuditAction::Login,
            Some("Inicio de sesión exitoso".to_string()),
            Some(json!({ "usuario_id": user_id, "success": true })),
            meta,
        )
        .await
    }

    /// Best effort: without a tenant nothing is recorded, and store failures are only logged
    pub async fn record_login_failed(&self, email: &str, reason: &str, meta: &RequestMeta) {
        if !TenantContext::has_tenant() {
            return;
        }
        let actor = Actor {
            user_id: None,
            email: Some(email.to_string()),
        };
        let result = self
            .record_action(
                &actor,
                AuditAction::LoginFailed,
                Some(format!("Intento de inicio de sesión fallido: {}", reason)),
                Some(json!({ "motivo": reason, "success": false })),
                meta,
            )
            .await;
        if let Err(e) = result {
            error!("Failed to record failed login: {}", e);
        }
    }

    pub async fn record_logout(&self, actor: &Actor, meta: &RequestMeta) -> Result<AuditLogSimple, AuditError> {
        self.record_action(actor, AuditAction::Logout, Some("Cierre de sesión".to_string()), None, meta)
            .await
    }

    /// Returns `false` when old and new values are equal and nothing was stored
    pub async fn record_critical_change(
        &self,
        actor: &Actor,
        change: FieldChange,
        meta: &RequestMeta,
    ) -> Result<bool, AuditError> {
        let tenant = TenantContext::require()?;
        let entry = NewCriticalEntry {
            user_id: actor.user_id,
            user_email: actor.email.clone(),
            table_name: change.table_name,
            record_id: change.record_id,
            field: change.field,
            old_value: change.old_value,
            new_value: change.new_value,
            operation: change.operation,
            reason: change.reason,
            ip_address: meta.ip_address.clone(),
            recorded_at: Utc::now(),
        };

        if !entry.has_change() {
            return Ok(false);
        }

        let row = self.store.insert_critical(&tenant, entry).await?;
        debug!("Critical audit entry recorded: {} - {} #{}", row.table_name, row.field, row.record_id);
        Ok(true)
    }

    /// Record several field changes of one record; returns how many were stored
    #[allow(clippy::too_many_arguments)]
    pub async fn record_changes(
        &self,
        actor: &Actor,
        table_name: &str,
        record_id: i64,
        changes: BTreeMap<String, (Option<String>, Option<String>)>,
        operation: AuditOperation,
        reason: Option<String>,
        meta: &RequestMeta,
    ) -> Result<usize, AuditError> {
        let mut stored = 0;
        for (field, (old_value, new_value)) in changes {
            let change = FieldChange {
                table_name: table_name.to_string(),
                record_id,
                field,
                old_value,
                new_value,
                operation,
                reason: reason.clone(),
            };
            if self.record_critical_change(actor, change, meta).await? {
                stored += 1;
            }
        }
        Ok(stored)
    }

    // ==================== QUERIES ====================

    pub async fn simple_logs(&self, filters: &AuditFilters) -> Result<Vec<SimpleLogView>, AuditError> {
        let tenant = TenantContext::require()?;
        let (from, to) = date_window(filters, Utc::now())?;
        let query = SimpleLogQuery {
            user_id: filters.usuario_id,
            action: filters.accion.clone(),
            from,
            to,
            limit: filters.limit,
        };
        let rows = self.store.find_simple(&tenant, &query).await?;
        Ok(rows.into_iter().map(SimpleLogView::from).collect())
    }

    pub async fn critical_logs(&self, filters: &AuditFilters) -> Result<Vec<CriticalLogView>, AuditError> {
        let tenant = TenantContext::require()?;
        let (from, to) = date_window(filters, Utc::now())?;
        let query = CriticalLogQuery {
            user_id: filters.usuario_id,
            table_name: filters.tabla.clone(),
            from,
            to,
            limit: filters.limit,
        };
        let rows = self.store.find_critical(&tenant, &query).await?;
        Ok(rows.into_iter().map(CriticalLogView::from).collect())
    }

    pub async fn record_history(&self, table_name: &str, record_id: i64) -> Result<Vec<CriticalLogView>, AuditError> {
        let tenant = TenantContext::require()?;
        let rows = self.store.record_history(&tenant, table_name, record_id).await?;
        Ok(rows.into_iter().map(CriticalLogView::from).collect())
    }

    pub async fn field_history(
        &self,
        table_name: &str,
        record_id: i64,
        field: &str,
    ) -> Result<Vec<CriticalLogView>, AuditError> {
        let tenant = TenantContext::require()?;
        let rows = self.store.field_history(&tenant, table_name, record_id, field).await?;
        Ok(rows.into_iter().map(CriticalLogView::from).collect())
    }

    pub async fn last_logins(&self, user_id: i64, limit: i64) -> Result<Vec<SimpleLogView>, AuditError> {
        let tenant = TenantContext::require()?;
        let rows = self.store.last_logins(&tenant, user_id, limit).await?;
        Ok(rows.into_iter().map(SimpleLogView::from).collect())
    }

    // ==================== ARCHIVAL ====================

    /// Archive the current tenant's records older than the retention window
    pub async fn archive_current_tenant(&self, now: DateTime<Utc>) -> Result<ArchiveCount, AuditError> {
        let tenant = TenantContext::require()?;
        let cutoff = self.retention_cutoff(now);

        info!("Archiving audit logs older than {} for tenant: {}", cutoff, tenant.id());
        let count = self.store.archive_aged(&tenant, cutoff).await?;
        info!(
            "Archive completed for tenant {}: {} simple, {} critical",
            tenant.id(),
            count.simple,
            count.critical
        );
        Ok(count)
    }

    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.retention_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Query window: explicit dates cover whole days, otherwise the last month up to `now`.
///
/// Only a range with both ends given can be rejected as inverted; a defaulted end
/// that lands on the wrong side just yields an empty window.
fn date_window(filters: &AuditFilters, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), AuditError> {
    let from = match filters.fecha_inicio {
        Some(date) => start_of_day(date)?,
        None => now.checked_sub_months(Months::new(1)).unwrap_or(now - Duration::days(30)),
    };
    let to = match filters.fecha_fin {
        Some(date) => end_of_day(date)?,
        None => now,
    };
    if from > to && filters.fecha_inicio.is_some() && filters.fecha_fin.is_some() {
        return Err(AuditError::InvalidRange(format!("{} is after {}", from, to)));
    }
    Ok((from, to))
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>, AuditError> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| AuditError::InvalidRange(date.to_string()))
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>, AuditError> {
    date.and_hms_opt(23, 59, 59)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| AuditError::InvalidRange(date.to_string()))
}
