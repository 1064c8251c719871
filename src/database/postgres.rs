use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::database::entities::{
    ArchiveCount, AuditLogCritical, AuditLogSimple, CriticalLogQuery, NewCriticalEntry, NewSimpleEntry,
    SimpleLogQuery, Tenant,
};
use crate::database::scoped::ScopedQuery;
use crate::database::store::{AuditStore, StoreError, TenantDirectory};
use crate::tenant::{ActiveTenant, MaintenanceScope, TenantId};

const SIMPLE_COLUMNS: &str =
    "id, tenant_id, usuario_id, usuario_email, accion, descripcion, ip_address, user_agent, metadata, fecha";

const CRITICAL_COLUMNS: &str = "id, tenant_id, usuario_id, usuario_email, tabla, registro_id, campo, \
     valor_anterior, valor_nuevo, operacion, motivo, ip_address, fecha";

// Each statement deletes and re-inserts in one step, so a row deleted by a
// concurrent run is simply not returned here.
const ARCHIVE_SIMPLE_SQL: &str = r#"
    WITH moved AS (
        DELETE FROM audit_log_simple
        WHERE tenant_id = $1 AND fecha < $2
        RETURNING tenant_id, accion, descripcion, usuario_email, ip_address, metadata, fecha
    )
    INSERT INTO audit_log_archive (tenant_id, tipo, datos, fecha_original, fecha_archivo)
    SELECT tenant_id, 'SIMPLE',
           jsonb_build_object(
               'accion', accion,
               'descripcion', descripcion,
               'usuario_email', usuario_email,
               'ip_address', ip_address,
               'metadata', metadata
           ),
           fecha, now()
    FROM moved
"#;

const ARCHIVE_CRITICAL_SQL: &str = r#"
    WITH moved AS (
        DELETE FROM audit_log_critica
        WHERE tenant_id = $1 AND fecha < $2
        RETURNING tenant_id, tabla, registro_id, campo, valor_anterior, valor_nuevo,
                  operacion, usuario_email, motivo, fecha
    )
    INSERT INTO audit_log_archive (tenant_id, tipo, datos, fecha_original, fecha_archivo)
    SELECT tenant_id, 'CRITICA',
           jsonb_build_object(
               'tabla', tabla,
               'registro_id', registro_id,
               'campo', campo,
               'valor_anterior', valor_anterior,
               'valor_nuevo', valor_nuevo,
               'operacion', operacion,
               'usuario_email', usuario_email,
               'motivo', motivo
           ),
           fecha, now()
    FROM moved
"#;

/// Postgres implementation of the audit and tenant stores
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert_simple(&self, tenant: &ActiveTenant, entry: NewSimpleEntry) -> Result<AuditLogSimple, StoreError> {
        let sql = format!(
            "INSERT INTO audit_log_simple \
             (tenant_id, usuario_id, usuario_email, accion, descripcion, ip_address, user_agent, metadata, fecha) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            SIMPLE_COLUMNS
        );

        let row = sqlx::query_as::<_, AuditLogSimple>(&sql)
            .bind(tenant.id().get())
            .bind(entry.user_id)
            .bind(entry.user_email)
            .bind(entry.action.as_str())
            .bind(entry.description)
            .bind(entry.ip_address)
            .bind(entry.user_agent)
            .bind(entry.metadata)
            .bind(entry.recorded_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn insert_critical(
        &self,
        tenant: &ActiveTenant,
        entry: NewCriticalEntry,
    ) -> Result<AuditLogCritical, StoreError> {
        let sql = format!(
            "INSERT INTO audit_log_critica \
             (tenant_id, usuario_id, usuario_email, tabla, registro_id, campo, valor_anterior, valor_nuevo, \
              operacion, motivo, ip_address, fecha) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
            CRITICAL_COLUMNS
        );

        let row = sqlx::query_as::<_, AuditLogCritical>(&sql)
            .bind(tenant.id().get())
            .bind(entry.user_id)
            .bind(entry.user_email)
            .bind(entry.table_name)
            .bind(entry.record_id)
            .bind(entry.field)
            .bind(entry.old_value)
            .bind(entry.new_value)
            .bind(entry.operation.as_str())
            .bind(entry.reason)
            .bind(entry.ip_address)
            .bind(entry.recorded_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_simple(&self, tenant: &ActiveTenant, query: &SimpleLogQuery) -> Result<Vec<AuditLogSimple>, StoreError> {
        let mut scoped = ScopedQuery::select(SIMPLE_COLUMNS, "audit_log_simple", tenant)
            .and_eq_opt("usuario_id", query.user_id)
            .and_eq_opt("accion", query.action.clone())
            .and_between("fecha", query.from, query.to)
            .order_by("fecha DESC")
            .limit(query.limit);

        let rows = scoped
            .builder_mut()
            .build_query_as::<AuditLogSimple>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_critical(
        &self,
        tenant: &ActiveTenant,
        query: &CriticalLogQuery,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let mut scoped = ScopedQuery::select(CRITICAL_COLUMNS, "audit_log_critica", tenant)
            .and_eq_opt("usuario_id", query.user_id)
            .and_eq_opt("tabla", query.table_name.clone())
            .and_between("fecha", query.from, query.to)
            .order_by("fecha DESC")
            .limit(query.limit);

        let rows = scoped
            .builder_mut()
            .build_query_as::<AuditLogCritical>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn record_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let mut scoped = ScopedQuery::select(CRITICAL_COLUMNS, "audit_log_critica", tenant)
            .and_eq("tabla", table_name.to_string())
            .and_eq("registro_id", record_id)
            .order_by("fecha DESC");

        let rows = scoped
            .builder_mut()
            .build_query_as::<AuditLogCritical>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn field_history(
        &self,
        tenant: &ActiveTenant,
        table_name: &str,
        record_id: i64,
        field: &str,
    ) -> Result<Vec<AuditLogCritical>, StoreError> {
        let mut scoped = ScopedQuery::select(CRITICAL_COLUMNS, "audit_log_critica", tenant)
            .and_eq("tabla", table_name.to_string())
            .and_eq("registro_id", record_id)
            .and_eq("campo", field.to_string())
            .order_by("fecha ASC");

        let rows = scoped
            .builder_mut()
            .build_query_as::<AuditLogCritical>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn last_logins(&self, tenant: &ActiveTenant, user_id: i64, limit: i64) -> Result<Vec<AuditLogSimple>, StoreError> {
        let mut scoped = ScopedQuery::select(SIMPLE_COLUMNS, "audit_log_simple", tenant)
            .and_eq("usuario_id", user_id)
            .and_eq("accion", "LOGIN".to_string())
            .order_by("fecha DESC")
            .limit(Some(limit));

        let rows = scoped
            .builder_mut()
            .build_query_as::<AuditLogSimple>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn archive_aged(&self, tenant: &ActiveTenant, cutoff: DateTime<Utc>) -> Result<ArchiveCount, StoreError> {
        let tenant_id = tenant.id().get();
        let mut tx = self.pool.begin().await?;

        let simple = sqlx::query(ARCHIVE_SIMPLE_SQL)
            .bind(tenant_id)
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let critical = sqlx::query(ARCHIVE_CRITICAL_SQL)
            .bind(tenant_id)
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(ArchiveCount { simple, critical })
    }
}

#[async_trait]
impl TenantDirectory for PgAuditStore {
    async fn find_tenant(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT id, nombre, activo FROM tenants WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn list_tenants(&self, scope: &MaintenanceScope) -> Result<Vec<Tenant>, StoreError> {
        tracing::debug!("Listing all tenants for job '{}'", scope.job());
        let tenants = sqlx::query_as::<_, Tenant>("SELECT id, nombre, activo FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tenants)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
