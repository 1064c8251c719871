use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub default_query_limit: i64,
    pub default_login_history_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub archive_enabled: bool,
    pub archive_hour: u32,
    pub archive_minute: u32,
    pub retention_months: u32,
}

/// Secret used when JWT_SECRET is not set outside production
const DEVELOPMENT_JWT_SECRET: &str = "terrenos-development-secret-change-me";
/// Upper bound on audit retention (100 years)
const MAX_RETENTION_MONTHS: u32 = 1200;

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.database.backend = StoreBackend::Memory,
                "postgres" | "postgresql" => self.database.backend = StoreBackend::Postgres,
                other => tracing::warn!("Ignoring unknown DATABASE_BACKEND '{}'", other),
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("TERRENOS_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_DEFAULT_QUERY_LIMIT") {
            self.api.default_query_limit = v.parse().unwrap_or(self.api.default_query_limit);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Audit overrides
        if let Ok(v) = env::var("AUDIT_ARCHIVE_ENABLED") {
            self.audit.archive_enabled = v.parse().unwrap_or(self.audit.archive_enabled);
        }
        if let Ok(v) = env::var("AUDIT_ARCHIVE_HOUR") {
            self.audit.archive_hour = v.parse().unwrap_or(self.audit.archive_hour);
        }
        if let Ok(v) = env::var("AUDIT_ARCHIVE_MINUTE") {
            self.audit.archive_minute = v.parse().unwrap_or(self.audit.archive_minute);
        }
        if let Ok(v) = env::var("AUDIT_RETENTION_MONTHS") {
            self.audit.retention_months = v.parse().unwrap_or(self.audit.retention_months);
        }

        self
    }

    /// Reject settings the server must not start with
    pub fn validate(&self) -> Result<(), String> {
        if self.security.jwt_secret.is_empty() {
            return Err("JWT_SECRET must be set".to_string());
        }
        if self.environment == Environment::Production && self.security.jwt_secret == DEVELOPMENT_JWT_SECRET {
            return Err("JWT_SECRET must not use the development default in production".to_string());
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err("DATABASE_URL is required for the postgres backend".to_string());
        }
        if !(1..=MAX_RETENTION_MONTHS).contains(&self.audit.retention_months) {
            return Err(format!("AUDIT_RETENTION_MONTHS must be between 1 and {}", MAX_RETENTION_MONTHS));
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: true,
                default_query_limit: 100,
                default_login_history_limit: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24,
            },
            audit: AuditConfig {
                archive_enabled: true,
                archive_hour: 2,
                archive_minute: 0,
                retention_months: 12,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: true,
                default_query_limit: 100,
                default_login_history_limit: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 8,
            },
            audit: AuditConfig {
                archive_enabled: true,
                archive_hour: 2,
                archive_minute: 0,
                retention_months: 12,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: false,
                default_query_limit: 100,
                default_login_history_limit: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                // must come from JWT_SECRET
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
            },
            audit: AuditConfig {
                archive_enabled: true,
                archive_hour: 2,
                archive_minute: 0,
                retention_months: 12,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.audit.archive_hour, 2);
        assert_eq!(config.audit.archive_minute, 0);
        assert_eq!(config.audit.retention_months, 12);
        assert_eq!(config.api.default_query_limit, 100);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let mut config = AppConfig::production();
        assert!(config.validate().is_err());

        config.security.jwt_secret = "prod-secret".to_string();
        assert!(config.validate().is_err());

        config.database.url = Some("postgres://localhost/terrenos".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_backend_needs_no_url() {
        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retention_months_are_bounded() {
        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;

        config.audit.retention_months = 0;
        assert!(config.validate().is_err());

        config.audit.retention_months = u32::MAX;
        assert!(config.validate().is_err());

        config.audit.retention_months = MAX_RETENTION_MONTHS;
        assert!(config.validate().is_ok());
    }
}
