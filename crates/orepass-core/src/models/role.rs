//! Role and role-assignment domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Upper-case with underscores (`^[A-Z_]+$`), unique.
    pub name: String,
    pub description: Option<String>,
    /// 0..=1000; higher wins wherever roles are ordered.
    pub priority: i64,
    /// Built-in roles the service layer refuses to delete.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    pub priority: i64,
    pub is_system: bool,
}

/// A user-to-role assignment row. Expired assignments stay on disk
/// and only drop out of "effective" queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Granting user; survives that user's removal as `None`.
    pub assigned_by: Option<Uuid>,
}

impl UserRole {
    /// An assignment is effective while unexpired.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Result of an assignment attempt. Re-assigning an already-held
/// role is a no-op, reported distinctly so callers can log it
/// accurately.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Assigned(UserRole),
    AlreadyAssigned,
}
