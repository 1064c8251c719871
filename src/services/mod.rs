pub mod archive_service;
pub mod audit_service;

pub use archive_service::{ArchiveError, ArchiveJob, ArchiveSummary, AuditArchiver, TenantFailure};
pub use audit_service::{Actor, AuditError, AuditFilters, AuditService, CriticalLogView, FieldChange, SimpleLogView};
