use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Customer organization row from the `tenants` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    #[sqlx(rename = "nombre")]
    pub name: String,
    #[sqlx(rename = "activo")]
    pub active: bool,
}

macro_rules! audit_catalog {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal, $description:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $($name::$variant => $description,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

audit_catalog! {
    /// General actions recorded in `audit_log_simple`
    AuditAction {
        Login => "LOGIN", "Inicio de sesión";
        Logout => "LOGOUT", "Cierre de sesión";
        LoginFailed => "LOGIN_FAILED", "Intento de inicio de sesión fallido";
        RefreshToken => "REFRESH_TOKEN", "Actualización de token";
        ExportPdf => "EXPORT_PDF", "Exportación a PDF";
        ExportExcel => "EXPORT_EXCEL", "Exportación a Excel";
        ExportCsv => "EXPORT_CSV", "Exportación a CSV";
        GenerateReport => "GENERATE_REPORT", "Generación de reporte";
        ViewReport => "VIEW_REPORT", "Visualización de reporte";
        UploadFile => "UPLOAD_FILE", "Carga de archivo";
        DownloadFile => "DOWNLOAD_FILE", "Descarga de archivo";
        DeleteFile => "DELETE_FILE", "Eliminación de archivo";
        BulkQuery => "BULK_QUERY", "Consulta masiva de datos";
        BulkExport => "BULK_EXPORT", "Exportación masiva de datos";
        ChangeSettings => "CHANGE_SETTINGS", "Cambio de configuración";
        Other => "OTHER", "Otra acción";
    }
}

audit_catalog! {
    /// Field-level operations recorded in `audit_log_critica`
    AuditOperation {
        Create => "CREATE", "Creación";
        Update => "UPDATE", "Actualización";
        Delete => "DELETE", "Eliminación";
        StatusChange => "STATUS_CHANGE", "Cambio de estado";
        PriceChange => "PRICE_CHANGE", "Cambio de precio";
        Assignment => "ASSIGNMENT", "Asignación";
        Transfer => "TRANSFER", "Transferencia";
    }
}

/// Row of `audit_log_simple`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogSimple {
    pub id: i64,
    pub tenant_id: i64,
    #[sqlx(rename = "usuario_id")]
    pub user_id: Option<i64>,
    #[sqlx(rename = "usuario_email")]
    pub user_email: Option<String>,
    #[sqlx(rename = "accion")]
    pub action: String,
    #[sqlx(rename = "descripcion")]
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<Value>,
    #[sqlx(rename = "fecha")]
    pub recorded_at: DateTime<Utc>,
}

/// Row of `audit_log_critica`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogCritical {
    pub id: i64,
    pub tenant_id: i64,
    #[sqlx(rename = "usuario_id")]
    pub user_id: Option<i64>,
    #[sqlx(rename = "usuario_email")]
    pub user_email: Option<String>,
    #[sqlx(rename = "tabla")]
    pub table_name: String,
    #[sqlx(rename = "registro_id")]
    pub record_id: i64,
    #[sqlx(rename = "campo")]
    pub field: String,
    #[sqlx(rename = "valor_anterior")]
    pub old_value: Option<String>,
    #[sqlx(rename = "valor_nuevo")]
    pub new_value: Option<String>,
    #[sqlx(rename = "operacion")]
    pub operation: String,
    #[sqlx(rename = "motivo")]
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    #[sqlx(rename = "fecha")]
    pub recorded_at: DateTime<Utc>,
}

/// Row of `audit_log_archive`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogArchive {
    pub id: i64,
    pub tenant_id: i64,
    #[sqlx(rename = "tipo")]
    pub kind: String,
    #[sqlx(rename = "datos")]
    pub data: Value,
    #[sqlx(rename = "fecha_original")]
    pub original_at: DateTime<Utc>,
    #[sqlx(rename = "fecha_archivo")]
    pub archived_at: DateTime<Utc>,
}

pub const ARCHIVE_KIND_SIMPLE: &str = "SIMPLE";
pub const ARCHIVE_KIND_CRITICAL: &str = "CRITICA";

#[derive(Debug, Clone)]
pub struct NewSimpleEntry {
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub action: AuditAction,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCriticalEntry {
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub table_name: String,
    pub record_id: i64,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub operation: AuditOperation,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NewCriticalEntry {
    /// Whether the old and new values actually differ
    pub fn has_change(&self) -> bool {
        match (&self.old_value, &self.new_value) {
            (None, None) => false,
            (Some(old), Some(new)) => old != new,
            _ => true,
        }
    }
}

/// Filters for `audit_log_simple` reads; the tenant predicate is added by the store
#[derive(Debug, Clone)]
pub struct SimpleLogQuery {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: Option<i64>,
}

/// Filters for `audit_log_critica` reads; the tenant predicate is added by the store
#[derive(Debug, Clone)]
pub struct CriticalLogQuery {
    pub user_id: Option<i64>,
    pub table_name: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub limit: Option<i64>,
}

/// Records moved to archived disposition by one archival pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveCount {
    pub simple: u64,
    pub critical: u64,
}

impl ArchiveCount {
    pub fn total(&self) -> u64 {
        self.simple + self.critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(old: Option<&str>, new: Option<&str>) -> NewCriticalEntry {
        NewCriticalEntry {
            user_id: None,
            user_email: None,
            table_name: "terrenos".into(),
            record_id: 1,
            field: "precio".into(),
            old_value: old.map(String::from),
            new_value: new.map(String::from),
            operation: AuditOperation::PriceChange,
            reason: None,
            ip_address: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn detects_real_changes_only() {
        assert!(!change(None, None).has_change());
        assert!(!change(Some("100"), Some("100")).has_change());
        assert!(change(Some("100"), Some("120")).has_change());
        assert!(change(None, Some("120")).has_change());
        assert!(change(Some("100"), None).has_change());
    }

    #[test]
    fn catalogs_round_trip_codes() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), *action);
        }
        assert_eq!("PRICE_CHANGE".parse::<AuditOperation>().unwrap(), AuditOperation::PriceChange);
        assert!("NOT_A_CODE".parse::<AuditOperation>().is_err());
        assert_eq!(AuditAction::LoginFailed.description(), "Intento de inicio de sesión fallido");
    }

    #[test]
    fn serde_uses_wire_codes() {
        let json = serde_json::to_string(&AuditAction::ExportCsv).unwrap();
        assert_eq!(json, "\"EXPORT_CSV\"");
    }
}
