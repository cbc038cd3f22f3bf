//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Read paths signal a miss as
//! `Ok(None)`, never as an error. Operations whose outcome depends on
//! "now" (expiry checks, retention cutoffs) take the instant as a
//! parameter so validity is always computed at read time against a
//! caller-supplied clock.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrepassResult;
use crate::models::{
    audit::{ActionStat, AuditLog, CreateAuditLog},
    role::{AssignOutcome, CreateRole, Role, UserRole},
    session::{CreateSession, Session, ValidatedSession},
    user::{CreateUser, UpdateUser, User, UserSummary},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

/// Filters for user listings.
#[derive(Debug, Clone, Default)]
pub struct UserListFilter {
    pub is_active: Option<bool>,
}

/// Filters for audit log queries. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub action: Option<crate::models::audit::AuditAction>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

/// Persisted user records. Every read excludes soft-deleted rows;
/// email and username comparisons are case-insensitive.
pub trait UserRepository: Send + Sync {
    /// Duplicate email/username surfaces as `Conflict`.
    fn create(&self, input: CreateUser) -> impl Future<Output = OrepassResult<User>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OrepassResult<Option<User>>> + Send;

    fn get_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = OrepassResult<Option<User>>> + Send;

    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = OrepassResult<Option<User>>> + Send;

    /// Partial update: only `Some` fields are applied.
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = OrepassResult<Option<User>>> + Send;

    fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn mark_verified(&self, id: Uuid) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn touch_last_login(&self, id: Uuid) -> impl Future<Output = OrepassResult<bool>> + Send;

    /// Marks the row invisible to all normal queries; the id stays
    /// referenceable for audit foreign keys.
    fn soft_delete(&self, id: Uuid) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn email_exists(&self, email: &str) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn username_exists(
        &self,
        username: &str,
    ) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn list(
        &self,
        filter: UserListFilter,
        pagination: Pagination,
    ) -> impl Future<Output = OrepassResult<PaginatedResult<UserSummary>>> + Send;

    /// Substring match over email, username and names.
    fn search(
        &self,
        term: &str,
        limit: i64,
    ) -> impl Future<Output = OrepassResult<Vec<UserSummary>>> + Send;
}

// ---------------------------------------------------------------------------
// Role registry
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = OrepassResult<Role>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OrepassResult<Option<Role>>> + Send;

    /// Name is upper-cased before lookup.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = OrepassResult<Option<Role>>> + Send;

    /// Ordered by priority descending.
    fn list_all(&self) -> impl Future<Output = OrepassResult<Vec<Role>>> + Send;

    /// Removes the role and, via cascade, its assignments. System
    /// roles are guarded at the service layer, not here.
    fn delete(&self, id: Uuid) -> impl Future<Output = OrepassResult<bool>> + Send;

    /// Idempotent: re-assigning an already-held role yields
    /// [`AssignOutcome::AlreadyAssigned`], not an error.
    fn assign(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = OrepassResult<AssignOutcome>> + Send;

    fn unassign(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = OrepassResult<bool>> + Send;

    /// Names of non-expired assignments, priority descending.
    fn effective_roles_of(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<Vec<String>>> + Send;

    fn user_has_role(
        &self,
        user_id: Uuid,
        role_name: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<bool>> + Send;

    /// Raw assignment rows, expired ones included.
    fn assignments_of(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = OrepassResult<Vec<UserRole>>> + Send;
}

// ---------------------------------------------------------------------------
// Session manager
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    /// Duplicate token surfaces as `Conflict`; an expiry at or before
    /// the creation instant is rejected structurally.
    fn create(
        &self,
        input: CreateSession,
    ) -> impl Future<Output = OrepassResult<Session>> + Send;

    /// Raw fetch by id, regardless of validity.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = OrepassResult<Option<Session>>> + Send;

    /// Joins the owning user; fails closed when the session is
    /// revoked or expired, or the owner is inactive or soft-deleted.
    fn validate(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<Option<ValidatedSession>>> + Send;

    /// Same validity rules as [`validate`], keyed by refresh token.
    ///
    /// [`validate`]: SessionRepository::validate
    fn find_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<Option<Session>>> + Send;

    /// Updates `last_activity_at`; returns false once revoked.
    fn touch(&self, id: Uuid) -> impl Future<Output = OrepassResult<bool>> + Send;

    /// One-way transition; returns false if already revoked or unknown.
    fn revoke(&self, session_token: &str) -> impl Future<Output = OrepassResult<bool>> + Send;

    fn revoke_all(&self, user_id: Uuid) -> impl Future<Output = OrepassResult<u64>> + Send;

    /// Non-revoked, non-expired sessions, most recently active first.
    fn list_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<Vec<Session>>> + Send;

    /// Storage hygiene: hard-deletes sessions expired more than seven
    /// days before `now`. Correctness never depends on this running.
    fn cleanup_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit recorder
// ---------------------------------------------------------------------------

pub trait AuditLogRepository: Send + Sync {
    /// Append-only; fails only on storage errors.
    fn record(
        &self,
        input: CreateAuditLog,
    ) -> impl Future<Output = OrepassResult<AuditLog>> + Send;

    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = OrepassResult<Option<AuditLog>>> + Send;

    /// Newest first. The page size is clamped to 1000 server-side
    /// regardless of what the caller requests.
    fn query(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = OrepassResult<PaginatedResult<AuditLog>>> + Send;

    fn recent_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> impl Future<Output = OrepassResult<Vec<AuditLog>>> + Send;

    fn by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        limit: i64,
    ) -> impl Future<Output = OrepassResult<Vec<AuditLog>>> + Send;

    /// Retention: removes entries older than `days` before `now`.
    fn delete_older_than(
        &self,
        days: i64,
        now: DateTime<Utc>,
    ) -> impl Future<Output = OrepassResult<u64>> + Send;

    /// Removes the trail of one entity (used when the entity itself
    /// is purged from the system).
    fn delete_by_entity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> impl Future<Output = OrepassResult<u64>> + Send;

    /// Per-action counts over an optional time window, most frequent
    /// first.
    fn action_statistics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> impl Future<Output = OrepassResult<Vec<ActionStat>>> + Send;
}
