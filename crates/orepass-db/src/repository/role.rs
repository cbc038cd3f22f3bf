//! SQLite implementation of [`RoleRepository`].
//!
//! Priority descending is the ordering everywhere roles are listed;
//! it decides which role a caller treats as primary. Expired
//! assignments are excluded from "effective" queries but never
//! deleted.

use chrono::{DateTime, Utc};
use orepass_core::error::OrepassResult;
use orepass_core::models::role::{AssignOutcome, CreateRole, Role, UserRole};
use orepass_core::repository::RoleRepository;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    priority: i64,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            description: row.description,
            priority: row.priority,
            is_system: row.is_system,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRoleRow {
    id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    assigned_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    assigned_by: Option<Uuid>,
}

impl From<UserRoleRow> for UserRole {
    fn from(row: UserRoleRow) -> Self {
        UserRole {
            id: row.id,
            user_id: row.user_id,
            role_id: row.role_id,
            assigned_at: row.assigned_at,
            expires_at: row.expires_at,
            assigned_by: row.assigned_by,
        }
    }
}

/// SQLite implementation of the role registry.
#[derive(Clone)]
pub struct SqliteRoleRepository {
    pool: SqlitePool,
}

impl SqliteRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RoleRepository for SqliteRoleRepository {
    async fn create(&self, input: CreateRole) -> OrepassResult<Role> {
        let CreateRole {
            name,
            description,
            priority,
            is_system,
        } = input;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row: RoleRow = sqlx::query_as(
            "INSERT INTO roles (
                 id, name, description, priority, is_system,
                 created_at, updated_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             RETURNING
                 id, name, description, priority, is_system,
                 created_at, updated_at",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(priority)
        .bind(is_system)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: Uuid) -> OrepassResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as(
            "SELECT id, name, description, priority, is_system,
                    created_at, updated_at
             FROM roles
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_name(&self, name: &str) -> OrepassResult<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as(
            "SELECT id, name, description, priority, is_system,
                    created_at, updated_at
             FROM roles
             WHERE name = ?1",
        )
        .bind(name.to_uppercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(Into::into))
    }

    async fn list_all(&self) -> OrepassResult<Vec<Role>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            "SELECT id, name, description, priority, is_system,
                    created_at, updated_at
             FROM roles
             ORDER BY priority DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: Uuid) -> OrepassResult<bool> {
        let deleted: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM roles
             WHERE id = ?1
             RETURNING id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(deleted.is_some())
    }

    async fn assign(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> OrepassResult<AssignOutcome> {
        // The conflicting insert is silently ignored; no returned row
        // means the (user, role) pair was already present.
        let row: Option<UserRoleRow> = sqlx::query_as(
            "INSERT INTO user_roles (
                 id, user_id, role_id, assigned_at, expires_at, assigned_by
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, role_id) DO NOTHING
             RETURNING
                 id, user_id, role_id, assigned_at, expires_at, assigned_by",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(role_id)
        .bind(Utc::now())
        .bind(expires_at)
        .bind(assigned_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(match row {
            Some(row) => AssignOutcome::Assigned(row.into()),
            None => AssignOutcome::AlreadyAssigned,
        })
    }

    async fn unassign(&self, user_id: Uuid, role_id: Uuid) -> OrepassResult<bool> {
        let deleted: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM user_roles
             WHERE user_id = ?1
               AND role_id = ?2
             RETURNING id",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(deleted.is_some())
    }

    async fn effective_roles_of(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> OrepassResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT r.name
             FROM user_roles ur
             JOIN roles r ON ur.role_id = r.id
             WHERE ur.user_id = ?1
               AND (ur.expires_at IS NULL OR ur.expires_at > ?2)
             ORDER BY r.priority DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(names)
    }

    async fn user_has_role(
        &self,
        user_id: Uuid,
        role_name: &str,
        now: DateTime<Utc>,
    ) -> OrepassResult<bool> {
        let has: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1
                 FROM user_roles ur
                 JOIN roles r ON ur.role_id = r.id
                 WHERE ur.user_id = ?1
                   AND r.name = ?2
                   AND (ur.expires_at IS NULL OR ur.expires_at > ?3)
             )",
        )
        .bind(user_id)
        .bind(role_name.to_uppercase())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(has)
    }

    async fn assignments_of(&self, user_id: Uuid) -> OrepassResult<Vec<UserRole>> {
        let rows: Vec<UserRoleRow> = sqlx::query_as(
            "SELECT id, user_id, role_id, assigned_at, expires_at, assigned_by
             FROM user_roles
             WHERE user_id = ?1
             ORDER BY assigned_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
