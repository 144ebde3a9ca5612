use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://...` for the PostgreSQL document store, `memory://` for the in-process one
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Route prefix for every resource, e.g. `/api/v1`. Empty mounts at the root.
    pub prefix: String,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub validation_status: ValidationStatus,
}

/// Status used for payload/schema validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    BadRequest,
    /// Legacy behaviour: validation failures reported as 401
    Unauthorized,
}

impl ValidationStatus {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "400" | "bad_request" | "bad-request" => Some(Self::BadRequest),
            "401" | "unauthorized" | "legacy" => Some(Self::Unauthorized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// YAML file with the authentication exemption table; built-in table when unset
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub public_path: String,
    pub max_gallery_images: usize,
}

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
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("SHOP_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_URL") {
            self.api.prefix = normalize_prefix(&v);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_VALIDATION_STATUS") {
            self.api.validation_status = ValidationStatus::parse(&v).unwrap_or(self.api.validation_status);
        }

        // Security overrides
        if let Some(v) = env::var("JWT_SECRET").ok().or_else(|| env::var("secret").ok()) {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("SECURITY_POLICY_FILE") {
            self.security.policy_file = Some(PathBuf::from(v));
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_DIR") {
            self.uploads.dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("UPLOAD_PUBLIC_PATH") {
            self.uploads.public_path = normalize_prefix(&v);
        }
        if let Ok(v) = env::var("UPLOAD_MAX_GALLERY_IMAGES") {
            self.uploads.max_gallery_images = v.parse().unwrap_or(self.uploads.max_gallery_images);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "memory://".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                prefix: "/api/v1".to_string(),
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                validation_status: ValidationStatus::BadRequest,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 10,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                policy_file: None,
            },
            uploads: UploadConfig {
                dir: PathBuf::from("public/uploads"),
                public_path: "/public/uploads".to_string(),
                max_gallery_images: 10,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                ..Self::development().api
            },
            security: SecurityConfig {
                bcrypt_cost: 12,
                cors_origins: vec!["https://staging.example.com".to_string()],
                ..Self::development().security
            },
            ..Self::development()
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                ..Self::development().api
            },
            security: SecurityConfig {
                bcrypt_cost: 12,
                cors_origins: vec!["https://shop.example.com".to_string()],
                ..Self::development().security
            },
            ..Self::development()
        }
    }

    /// Problems that must stop the process before it binds a socket.
    pub fn validate(&self) -> Result<(), String> {
        if self.security.jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET must be set".to_string());
        }
        if self.database.url.trim().is_empty() {
            return Err("DATABASE_URL must be set".to_string());
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.security.bcrypt_cost) {
            return Err(format!(
                "SECURITY_BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            ));
        }
        if self.uploads.public_path.trim_matches('/').is_empty() {
            return Err("UPLOAD_PUBLIC_PATH must not be empty".to_string());
        }
        Ok(())
    }
}

/// `api/v1/` -> `/api/v1`, `/` -> ``
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
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
        assert_eq!(config.api.prefix, "/api/v1");
        assert_eq!(config.security.jwt_expiry_hours, 24);
        assert_eq!(config.uploads.max_gallery_images, 10);
        assert_eq!(config.api.validation_status, ValidationStatus::BadRequest);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.database.max_connections, 50);
        assert!(config.database.url.is_empty());
    }

    #[test]
    fn normalizes_prefixes() {
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/api/v1"), "/api/v1");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn parses_validation_status() {
        assert_eq!(ValidationStatus::parse("401"), Some(ValidationStatus::Unauthorized));
        assert_eq!(ValidationStatus::parse("legacy"), Some(ValidationStatus::Unauthorized));
        assert_eq!(ValidationStatus::parse("400"), Some(ValidationStatus::BadRequest));
        assert_eq!(ValidationStatus::parse("418"), None);
    }

    #[test]
    fn validate_rejects_missing_secret() {
        let mut config = AppConfig::development();
        assert!(config.validate().is_err());

        config.security.jwt_secret = "s3cret".to_string();
        assert!(config.validate().is_ok());

        config.security.bcrypt_cost = 1;
        assert!(config.validate().is_err());
    }
}
