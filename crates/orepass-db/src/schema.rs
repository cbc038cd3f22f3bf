//! Schema definitions and migration runner.
//!
//! Migrations are embedded SQL, applied in version order and tracked
//! in a `_migration` table. UUIDs are stored as 16-byte blobs and
//! timestamps as UTC text, both generated app-side so the schema
//! never depends on the storage engine's clock.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS _migration (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
CREATE TABLE users (
    id BLOB PRIMARY KEY NOT NULL,
    email TEXT NOT NULL CHECK (length(email) <= 255),
    username TEXT NOT NULL
        CHECK (length(username) >= 3 AND length(username) <= 100),
    password_hash TEXT NOT NULL,
    first_name TEXT,
    last_name TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_verified INTEGER NOT NULL DEFAULT 0,
    email_verified_at TEXT,
    last_login_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Uniqueness holds among non-deleted rows only, so a soft-deleted
-- account frees its email and username for re-registration.
CREATE UNIQUE INDEX idx_users_email
    ON users (lower(email)) WHERE deleted_at IS NULL;
CREATE UNIQUE INDEX idx_users_username
    ON users (lower(username)) WHERE deleted_at IS NULL;
CREATE INDEX idx_users_is_active
    ON users (is_active) WHERE deleted_at IS NULL;
CREATE INDEX idx_users_created_at ON users (created_at);

-- =======================================================================
-- Roles
-- =======================================================================
CREATE TABLE roles (
    id BLOB PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE CHECK (length(name) <= 50),
    description TEXT,
    priority INTEGER NOT NULL DEFAULT 0
        CHECK (priority >= 0 AND priority <= 1000),
    is_system INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_roles_priority ON roles (priority);

-- =======================================================================
-- Role assignments (many-to-many, optional expiry)
-- =======================================================================
CREATE TABLE user_roles (
    id BLOB PRIMARY KEY NOT NULL,
    user_id BLOB NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    role_id BLOB NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
    assigned_at TEXT NOT NULL,
    expires_at TEXT,
    assigned_by BLOB REFERENCES users (id) ON DELETE SET NULL,
    UNIQUE (user_id, role_id)
);

CREATE INDEX idx_user_roles_user_id ON user_roles (user_id);
CREATE INDEX idx_user_roles_role_id ON user_roles (role_id);

-- =======================================================================
-- Sessions
-- =======================================================================
CREATE TABLE sessions (
    id BLOB PRIMARY KEY NOT NULL,
    user_id BLOB NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    session_token TEXT NOT NULL UNIQUE
        CHECK (length(session_token) <= 500),
    refresh_token TEXT UNIQUE
        CHECK (refresh_token IS NULL OR length(refresh_token) <= 500),
    ip_address TEXT,
    user_agent TEXT,
    expires_at TEXT NOT NULL,
    last_activity_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    revoked_at TEXT,
    CHECK (expires_at > created_at)
);

CREATE INDEX idx_sessions_user_id
    ON sessions (user_id) WHERE revoked_at IS NULL;
CREATE INDEX idx_sessions_expires_at
    ON sessions (expires_at) WHERE revoked_at IS NULL;

-- =======================================================================
-- Audit trail (append-only)
-- =======================================================================
CREATE TABLE audit_logs (
    id BLOB PRIMARY KEY NOT NULL,
    user_id BLOB REFERENCES users (id) ON DELETE SET NULL,
    action TEXT NOT NULL CHECK (action IN (
        'LOGIN', 'LOGOUT', 'LOGIN_FAILED',
        'CREATE', 'READ', 'UPDATE', 'DELETE',
        'CONFIG_CHANGE', 'PERMISSION_CHANGE',
        'ERROR', 'WARNING', 'INFO')),
    entity_type TEXT
        CHECK (entity_type IS NULL OR length(entity_type) <= 100),
    entity_id BLOB,
    description TEXT NOT NULL,
    extra_data TEXT,
    ip_address TEXT
        CHECK (ip_address IS NULL OR length(ip_address) <= 45),
    user_agent TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_audit_logs_user_created
    ON audit_logs (user_id, created_at);
CREATE INDEX idx_audit_logs_action_created
    ON audit_logs (action, created_at);
CREATE INDEX idx_audit_logs_entity
    ON audit_logs (entity_type, entity_id);
CREATE INDEX idx_audit_logs_created_at ON audit_logs (created_at);
";

/// Apply all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::raw_sql(MIGRATION_TABLE_DDL).execute(pool).await?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM _migration ORDER BY version")
        .fetch_all(pool)
        .await?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );

        sqlx::raw_sql(migration.sql)
            .execute(pool)
            .await
            .map_err(|e| DbError::Migration(format!("{}: {e}", migration.name)))?;

        sqlx::query("INSERT INTO _migration (version, name) VALUES (?1, ?2)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(pool)
            .await?;
    }

    Ok(())
}
