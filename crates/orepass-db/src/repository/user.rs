//! SQLite implementation of [`UserRepository`].
//!
//! Every statement carries the `deleted_at IS NULL` exclusion, so a
//! soft-deleted account is invisible to all reads and writes here
//! while its id stays referenceable from the audit trail.

use chrono::{DateTime, Utc};
use orepass_core::error::OrepassResult;
use orepass_core::models::user::{CreateUser, UpdateUser, User, UserSummary};
use orepass_core::repository::{PaginatedResult, Pagination, UserListFilter, UserRepository};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for full user records.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: bool,
    is_verified: bool,
    email_verified_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.is_active,
            is_verified: row.is_verified,
            email_verified_at: row.email_verified_at,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DB-side row struct for list/search projections.
#[derive(Debug, sqlx::FromRow)]
struct UserSummaryRow {
    id: Uuid,
    email: String,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_active: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        UserSummary {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.is_active,
            is_verified: row.is_verified,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        }
    }
}

/// SQLite implementation of the credential store.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, input: CreateUser) -> OrepassResult<User> {
        let CreateUser {
            email,
            username,
            password_hash,
            first_name,
            last_name,
        } = input;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (
                 id, email, username, password_hash,
                 first_name, last_name, created_at, updated_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING
                 id, email, username, password_hash,
                 first_name, last_name, is_active, is_verified,
                 email_verified_at, last_login_at,
                 created_at, updated_at",
        )
        .bind(id)
        .bind(email.to_lowercase())
        .bind(username)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> OrepassResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, username, password_hash,
                    first_name, last_name, is_active, is_verified,
                    email_verified_at, last_login_at,
                    created_at, updated_at
             FROM users
             WHERE id = ?1
               AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn get_by_email(&self, email: &str) -> OrepassResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, username, password_hash,
                    first_name, last_name, is_active, is_verified,
                    email_verified_at, last_login_at,
                    created_at, updated_at
             FROM users
             WHERE lower(email) = lower(?1)
               AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn get_by_username(&self, username: &str) -> OrepassResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, username, password_hash,
                    first_name, last_name, is_active, is_verified,
                    email_verified_at, last_login_at,
                    created_at, updated_at
             FROM users
             WHERE lower(username) = lower(?1)
               AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> OrepassResult<Option<User>> {
        let UpdateUser {
            email,
            username,
            first_name,
            last_name,
            is_active,
        } = input;

        let row: Option<UserRow> = sqlx::query_as(
            "UPDATE users
             SET email = COALESCE(?2, email),
                 username = COALESCE(?3, username),
                 first_name = COALESCE(?4, first_name),
                 last_name = COALESCE(?5, last_name),
                 is_active = COALESCE(?6, is_active),
                 updated_at = ?7
             WHERE id = ?1
               AND deleted_at IS NULL
             RETURNING
                 id, email, username, password_hash,
                 first_name, last_name, is_active, is_verified,
                 email_verified_at, last_login_at,
                 created_at, updated_at",
        )
        .bind(id)
        .bind(email.map(|e| e.to_lowercase()))
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> OrepassResult<bool> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users
             SET password_hash = ?2, updated_at = ?3
             WHERE id = ?1
               AND deleted_at IS NULL
             RETURNING id",
        )
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(updated.is_some())
    }

    async fn mark_verified(&self, id: Uuid) -> OrepassResult<bool> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users
             SET is_verified = 1, email_verified_at = ?2, updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL
             RETURNING id",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(updated.is_some())
    }

    async fn touch_last_login(&self, id: Uuid) -> OrepassResult<bool> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users
             SET last_login_at = ?2, updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL
             RETURNING id",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(updated.is_some())
    }

    async fn soft_delete(&self, id: Uuid) -> OrepassResult<bool> {
        let deleted: Option<Uuid> = sqlx::query_scalar(
            "UPDATE users
             SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1
               AND deleted_at IS NULL
             RETURNING id",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(deleted.is_some())
    }

    async fn email_exists(&self, email: &str) -> OrepassResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM users
                 WHERE lower(email) = lower(?1)
                   AND deleted_at IS NULL
             )",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> OrepassResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM users
                 WHERE lower(username) = lower(?1)
                   AND deleted_at IS NULL
             )",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(exists)
    }

    async fn list(
        &self,
        filter: UserListFilter,
        pagination: Pagination,
    ) -> OrepassResult<PaginatedResult<UserSummary>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM users
             WHERE deleted_at IS NULL
               AND (?1 IS NULL OR is_active = ?1)",
        )
        .bind(filter.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, email, username, first_name, last_name,
                    is_active, is_verified, created_at, last_login_at
             FROM users
             WHERE deleted_at IS NULL
               AND (?1 IS NULL OR is_active = ?1)
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(filter.is_active)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(PaginatedResult {
            items: rows.into_iter().map(Into::into).collect(),
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn search(&self, term: &str, limit: i64) -> OrepassResult<Vec<UserSummary>> {
        let pattern = format!("%{term}%");

        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, email, username, first_name, last_name,
                    is_active, is_verified, created_at, last_login_at
             FROM users
             WHERE deleted_at IS NULL
               AND (
                   lower(email) LIKE lower(?1) OR
                   lower(username) LIKE lower(?1) OR
                   lower(first_name) LIKE lower(?1) OR
                   lower(last_name) LIKE lower(?1)
               )
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
