//! Environment-driven server configuration.

use std::env;
use std::str::FromStr;

use orepass_auth::AuthConfig;
use orepass_db::DbConfig;

/// Read an env var, falling back to a default when unset or
/// unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Full server configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    /// Seconds between hygiene sweeps (session cleanup + audit
    /// retention).
    pub cleanup_interval_secs: u64,
    /// Audit entries older than this many days are removed by the
    /// hygiene sweep.
    pub audit_retention_days: i64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let db = DbConfig {
            url: env_or("DATABASE_URL", "sqlite://orepass.db".to_string()),
            min_connections: env_or("DB_MIN_POOL_SIZE", 5),
            max_connections: env_or("DB_MAX_POOL_SIZE", 20),
            acquire_timeout_secs: env_or("DB_POOL_TIMEOUT", 30),
        };

        let auth = AuthConfig {
            jwt_secret: env_or(
                "JWT_SECRET",
                "dev-secret-key-change-in-production".to_string(),
            ),
            jwt_issuer: env_or("JWT_ISSUER", "orepass".to_string()),
            session_lifetime_secs: env_or("SESSION_TTL_MINUTES", 30u64) * 60,
            pepper: env::var("PASSWORD_PEPPER").ok(),
            min_password_length: env_or("MIN_PASSWORD_LENGTH", 8),
        };

        Self {
            db,
            auth,
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", 3600),
            audit_retention_days: env_or("AUDIT_RETENTION_DAYS", 90),
        }
    }
}
