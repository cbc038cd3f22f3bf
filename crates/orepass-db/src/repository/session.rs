//! SQLite implementation of [`SessionRepository`].
//!
//! Validity is always computed at read time from `revoked_at` and
//! `expires_at` against the caller's `now`, so correctness never
//! depends on the cleanup sweep having run.

use chrono::{DateTime, Duration, Utc};
use orepass_core::error::OrepassResult;
use orepass_core::models::session::{CreateSession, Session, ValidatedSession};
use orepass_core::repository::SessionRepository;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;

/// Sessions expired longer than this are eligible for hard deletion.
const CLEANUP_GRACE_DAYS: i64 = 7;

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    session_token: String,
    refresh_token: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            session_token: row.session_token,
            refresh_token: row.refresh_token,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Row struct for the validate join (session + owning user).
#[derive(Debug, sqlx::FromRow)]
struct ValidatedSessionRow {
    session_id: Uuid,
    user_id: Uuid,
    email: String,
    username: String,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl From<ValidatedSessionRow> for ValidatedSession {
    fn from(row: ValidatedSessionRow) -> Self {
        ValidatedSession {
            session_id: row.session_id,
            user_id: row.user_id,
            email: row.email,
            username: row.username,
            expires_at: row.expires_at,
            last_activity_at: row.last_activity_at,
        }
    }
}

/// SQLite implementation of the session manager.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, input: CreateSession) -> OrepassResult<Session> {
        let CreateSession {
            user_id,
            session_token,
            refresh_token,
            ip_address,
            user_agent,
            expires_at,
        } = input;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: SessionRow = sqlx::query_as(
            "INSERT INTO sessions (
                 id, user_id, session_token, refresh_token,
                 ip_address, user_agent,
                 expires_at, last_activity_at, created_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             RETURNING
                 id, user_id, session_token, refresh_token,
                 ip_address, user_agent, expires_at,
                 last_activity_at, created_at, revoked_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(session_token)
        .bind(refresh_token)
        .bind(ip_address)
        .bind(user_agent)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> OrepassResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, session_token, refresh_token,
                    ip_address, user_agent, expires_at,
                    last_activity_at, created_at, revoked_at
             FROM sessions
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn validate(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> OrepassResult<Option<ValidatedSession>> {
        // A session survives in storage after its user is deactivated
        // or soft-deleted, but stops validating immediately.
        let row: Option<ValidatedSessionRow> = sqlx::query_as(
            "SELECT s.id AS session_id, s.user_id, u.email, u.username,
                    s.expires_at, s.last_activity_at
             FROM sessions s
             JOIN users u ON s.user_id = u.id
             WHERE s.session_token = ?1
               AND s.revoked_at IS NULL
               AND s.expires_at > ?2
               AND u.is_active = 1
               AND u.deleted_at IS NULL",
        )
        .bind(session_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> OrepassResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT s.id, s.user_id, s.session_token, s.refresh_token,
                    s.ip_address, s.user_agent, s.expires_at,
                    s.last_activity_at, s.created_at, s.revoked_at
             FROM sessions s
             JOIN users u ON s.user_id = u.id
             WHERE s.refresh_token = ?1
               AND s.revoked_at IS NULL
               AND s.expires_at > ?2
               AND u.is_active = 1
               AND u.deleted_at IS NULL",
        )
        .bind(refresh_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn touch(&self, id: Uuid) -> OrepassResult<bool> {
        let touched: Option<Uuid> = sqlx::query_scalar(
            "UPDATE sessions
             SET last_activity_at = ?2
             WHERE id = ?1
               AND revoked_at IS NULL
             RETURNING id",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(touched.is_some())
    }

    async fn revoke(&self, session_token: &str) -> OrepassResult<bool> {
        let revoked: Option<Uuid> = sqlx::query_scalar(
            "UPDATE sessions
             SET revoked_at = ?2
             WHERE session_token = ?1
               AND revoked_at IS NULL
             RETURNING id",
        )
        .bind(session_token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(revoked.is_some())
    }

    async fn revoke_all(&self, user_id: Uuid) -> OrepassResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions
             SET revoked_at = ?2
             WHERE user_id = ?1
               AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(result.rows_affected())
    }

    async fn list_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> OrepassResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT id, user_id, session_token, refresh_token,
                    ip_address, user_agent, expires_at,
                    last_activity_at, created_at, revoked_at
             FROM sessions
             WHERE user_id = ?1
               AND revoked_at IS NULL
               AND expires_at > ?2
             ORDER BY last_activity_at DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> OrepassResult<u64> {
        let cutoff = now - Duration::days(CLEANUP_GRACE_DAYS);

        let result = sqlx::query(
            "DELETE FROM sessions
             WHERE expires_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(result.rows_affected())
    }
}
