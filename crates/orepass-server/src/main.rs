//! orepass server — application entry point.
//!
//! Owns the lifecycle of the process-wide pool: build at startup,
//! hand to the repositories, close on shutdown. Between those points
//! it runs the periodic hygiene sweep that the stores themselves
//! never schedule (session cleanup is pure storage hygiene — validity
//! is computed at read time).

mod config;

use chrono::Utc;
use orepass_auth::AuthService;
use orepass_core::repository::{AuditLogRepository, SessionRepository};
use orepass_db::repository::{
    SqliteAuditLogRepository, SqliteRoleRepository, SqliteSessionRepository, SqliteUserRepository,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("orepass=info".parse().unwrap()),
        )
        .json()
        .init();

    let config = ServerConfig::from_env();
    info!("starting orepass server");

    let pool = orepass_db::connect(&config.db).await?;
    orepass_db::run_migrations(&pool).await?;

    let users = SqliteUserRepository::new(pool.clone());
    let roles = SqliteRoleRepository::new(pool.clone());
    let sessions = SqliteSessionRepository::new(pool.clone());
    let audit = SqliteAuditLogRepository::new(pool.clone());

    // Constructed here so a bad configuration fails at startup; the
    // HTTP surface receives this handle when it mounts.
    let _auth = AuthService::new(
        users,
        roles,
        sessions.clone(),
        audit.clone(),
        config.auth.clone(),
    );
    info!("authentication service ready");

    let mut sweep = tokio::time::interval(std::time::Duration::from_secs(
        config.cleanup_interval_secs,
    ));

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                run_hygiene_sweep(&sessions, &audit, config.audit_retention_days).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    pool.close().await;
    info!("orepass server stopped");

    Ok(())
}

/// Delete sessions expired past their grace period and audit entries
/// past retention. Failures are logged and retried on the next tick.
async fn run_hygiene_sweep(
    sessions: &SqliteSessionRepository,
    audit: &SqliteAuditLogRepository,
    audit_retention_days: i64,
) {
    let now = Utc::now();

    match sessions.cleanup_expired(now).await {
        Ok(removed) => info!(removed, "expired sessions cleaned up"),
        Err(e) => error!(error = %e, "session cleanup failed"),
    }

    match audit.delete_older_than(audit_retention_days, now).await {
        Ok(removed) => info!(removed, "aged audit entries removed"),
        Err(e) => error!(error = %e, "audit retention sweep failed"),
    }
}
