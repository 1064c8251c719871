use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::store::{StoreError, TenantDirectory};
use crate::services::audit_service::{AuditError, AuditService};
use crate::tenant::{MaintenanceScope, TenantContext, TenantId};

const ARCHIVE_JOB: &str = "audit-archive";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to list tenants: {0}")]
    ListTenants(#[source] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TenantFailure {
    pub tenant_id: i64,
    pub reason: String,
}

/// Result of one cross-tenant archival pass
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub tenants_processed: usize,
    pub archived_simple: u64,
    pub archived_critical: u64,
    pub failures: Vec<TenantFailure>,
}

impl ArchiveSummary {
    pub fn total(&self) -> u64 {
        self.archived_simple + self.archived_critical
    }
}

/// Work unit driven by the archive scheduler
#[async_trait]
pub trait ArchiveJob: Send + Sync {
    async fn archive_aged_records(&self) -> Result<ArchiveSummary, ArchiveError>;
}

/// Archives aged audit records for every tenant, one tenant context at a time
#[derive(Clone)]
pub struct AuditArchiver {
    directory: Arc<dyn TenantDirectory>,
    audit: AuditService,
}

impl AuditArchiver {
    pub fn new(directory: Arc<dyn TenantDirectory>, audit: AuditService) -> Self {
        Self { directory, audit }
    }

    pub async fn archive_at(&self, now: DateTime<Utc>) -> Result<ArchiveSummary, ArchiveError> {
        let scope = MaintenanceScope::begin(ARCHIVE_JOB);
        let tenants = self
            .directory
            .list_tenants(&scope)
            .await
            .map_err(ArchiveError::ListTenants)?;

        let mut summary = ArchiveSummary::default();

        for tenant in tenants {
            summary.tenants_processed += 1;

            let result = match TenantId::try_from(tenant.id) {
                Ok(id) => TenantContext::with_tenant(id, self.audit.archive_current_tenant(now))
                    .await
                    .map_err(AuditError::from)
                    .and_then(|inner| inner),
                Err(e) => Err(AuditError::from(e)),
            };

            match result {
                Ok(count) => {
                    summary.archived_simple += count.simple;
                    summary.archived_critical += count.critical;
                }
                Err(e) => {
                    warn!("Archival failed for tenant {} ({}): {}", tenant.id, tenant.name, e);
                    summary.failures.push(TenantFailure {
                        tenant_id: tenant.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl ArchiveJob for AuditArchiver {
    async fn archive_aged_records(&self) -> Result<ArchiveSummary, ArchiveError> {
        info!("Starting audit log archival");
        let summary = self.archive_at(Utc::now()).await?;

        info!(
            "Audit archival finished: {} records archived across {} tenants",
            summary.total(),
            summary.tenants_processed
        );
        for failure in &summary.failures {
            error!("Tenant {} was not archived: {}", failure.tenant_id, failure.reason);
        }

        Ok(summary)
    }
}
