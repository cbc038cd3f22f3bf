//! SQLite implementation of [`AuditLogRepository`].
//!
//! Entries are append-only: there is no UPDATE statement in this
//! file, and deletion exists only for retention policy.

use chrono::{DateTime, Duration, Utc};
use orepass_core::error::OrepassResult;
use orepass_core::models::audit::{ActionStat, AuditAction, AuditLog, CreateAuditLog};
use orepass_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;

/// Hard upper bound on page size, applied regardless of the caller's
/// request.
const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<Uuid>,
    description: String,
    extra_data: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditLogRow {
    fn try_into_log(self) -> Result<AuditLog, DbError> {
        let action = AuditAction::parse(&self.action)
            .ok_or_else(|| DbError::Decode(format!("unknown audit action: {}", self.action)))?;
        Ok(AuditLog {
            id: self.id,
            user_id: self.user_id,
            action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            description: self.description,
            extra_data: self.extra_data,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActionStatRow {
    action: String,
    count: i64,
    unique_users: i64,
    first_occurrence: DateTime<Utc>,
    last_occurrence: DateTime<Utc>,
}

impl ActionStatRow {
    fn try_into_stat(self) -> Result<ActionStat, DbError> {
        let action = AuditAction::parse(&self.action)
            .ok_or_else(|| DbError::Decode(format!("unknown audit action: {}", self.action)))?;
        Ok(ActionStat {
            action,
            count: self.count,
            unique_users: self.unique_users,
            first_occurrence: self.first_occurrence,
            last_occurrence: self.last_occurrence,
        })
    }
}

/// SQLite implementation of the audit recorder.
#[derive(Clone)]
pub struct SqliteAuditLogRepository {
    pool: SqlitePool,
}

impl SqliteAuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AuditLogRepository for SqliteAuditLogRepository {
    async fn record(&self, input: CreateAuditLog) -> OrepassResult<AuditLog> {
        let CreateAuditLog {
            user_id,
            action,
            entity_type,
            entity_id,
            description,
            extra_data,
            ip_address,
            user_agent,
        } = input;

        let row: AuditLogRow = sqlx::query_as(
            "INSERT INTO audit_logs (
                 id, user_id, action, entity_type, entity_id,
                 description, extra_data, ip_address, user_agent,
                 created_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING
                 id, user_id, action, entity_type, entity_id,
                 description, extra_data, ip_address, user_agent,
                 created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(action.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(description)
        .bind(extra_data)
        .bind(ip_address)
        .bind(user_agent)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.try_into_log()?)
    }

    async fn get_by_id(&self, id: Uuid) -> OrepassResult<Option<AuditLog>> {
        let row: Option<AuditLogRow> = sqlx::query_as(
            "SELECT id, user_id, action, entity_type, entity_id,
                    description, extra_data, ip_address, user_agent,
                    created_at
             FROM audit_logs
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(row.map(AuditLogRow::try_into_log).transpose()?)
    }

    async fn query(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> OrepassResult<PaginatedResult<AuditLog>> {
        let limit = pagination.limit.clamp(0, MAX_PAGE_SIZE);
        let action = filter.action.map(|a| a.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM audit_logs
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR action = ?2)
               AND (?3 IS NULL OR entity_type = ?3)
               AND (?4 IS NULL OR entity_id = ?4)
               AND (?5 IS NULL OR created_at >= ?5)
               AND (?6 IS NULL OR created_at <= ?6)",
        )
        .bind(filter.user_id)
        .bind(action)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        let rows: Vec<AuditLogRow> = sqlx::query_as(
            "SELECT id, user_id, action, entity_type, entity_id,
                    description, extra_data, ip_address, user_agent,
                    created_at
             FROM audit_logs
             WHERE (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR action = ?2)
               AND (?3 IS NULL OR entity_type = ?3)
               AND (?4 IS NULL OR entity_id = ?4)
               AND (?5 IS NULL OR created_at >= ?5)
               AND (?6 IS NULL OR created_at <= ?6)
             ORDER BY created_at DESC
             LIMIT ?7 OFFSET ?8",
        )
        .bind(filter.user_id)
        .bind(action)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.start)
        .bind(filter.end)
        .bind(limit)
        .bind(pagination.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        let items = rows
            .into_iter()
            .map(AuditLogRow::try_into_log)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit,
        })
    }

    async fn recent_by_user(&self, user_id: Uuid, limit: i64) -> OrepassResult<Vec<AuditLog>> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            "SELECT id, user_id, action, entity_type, entity_id,
                    description, extra_data, ip_address, user_agent,
                    created_at
             FROM audit_logs
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit.clamp(0, MAX_PAGE_SIZE))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows
            .into_iter()
            .map(AuditLogRow::try_into_log)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        limit: i64,
    ) -> OrepassResult<Vec<AuditLog>> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(
            "SELECT id, user_id, action, entity_type, entity_id,
                    description, extra_data, ip_address, user_agent,
                    created_at
             FROM audit_logs
             WHERE entity_type = ?1
               AND entity_id = ?2
             ORDER BY created_at DESC
             LIMIT ?3",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit.clamp(0, MAX_PAGE_SIZE))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows
            .into_iter()
            .map(AuditLogRow::try_into_log)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn delete_older_than(&self, days: i64, now: DateTime<Utc>) -> OrepassResult<u64> {
        let cutoff = now - Duration::days(days);

        let result = sqlx::query(
            "DELETE FROM audit_logs
             WHERE created_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(result.rows_affected())
    }

    async fn delete_by_entity(&self, entity_type: &str, entity_id: Uuid) -> OrepassResult<u64> {
        let result = sqlx::query(
            "DELETE FROM audit_logs
             WHERE entity_type = ?1
               AND entity_id = ?2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(result.rows_affected())
    }

    async fn action_statistics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> OrepassResult<Vec<ActionStat>> {
        let rows: Vec<ActionStatRow> = sqlx::query_as(
            "SELECT action,
                    COUNT(*) AS count,
                    COUNT(DISTINCT user_id) AS unique_users,
                    MIN(created_at) AS first_occurrence,
                    MAX(created_at) AS last_occurrence
             FROM audit_logs
             WHERE (?1 IS NULL OR created_at >= ?1)
               AND (?2 IS NULL OR created_at <= ?2)
             GROUP BY action
             ORDER BY count DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from_query)?;

        Ok(rows
            .into_iter()
            .map(ActionStatRow::try_into_stat)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
