//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of auditable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Login,
    Logout,
    LoginFailed,
    Create,
    Read,
    Update,
    Delete,
    ConfigChange,
    PermissionChange,
    Error,
    Warning,
    Info,
}

impl AuditAction {
    /// Wire/storage representation (upper snake case).
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::Create => "CREATE",
            AuditAction::Read => "READ",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::ConfigChange => "CONFIG_CHANGE",
            AuditAction::PermissionChange => "PERMISSION_CHANGE",
            AuditAction::Error => "ERROR",
            AuditAction::Warning => "WARNING",
            AuditAction::Info => "INFO",
        }
    }

    pub fn parse(s: &str) -> Option<AuditAction> {
        match s {
            "LOGIN" => Some(AuditAction::Login),
            "LOGOUT" => Some(AuditAction::Logout),
            "LOGIN_FAILED" => Some(AuditAction::LoginFailed),
            "CREATE" => Some(AuditAction::Create),
            "READ" => Some(AuditAction::Read),
            "UPDATE" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            "CONFIG_CHANGE" => Some(AuditAction::ConfigChange),
            "PERMISSION_CHANGE" => Some(AuditAction::PermissionChange),
            "ERROR" => Some(AuditAction::Error),
            "WARNING" => Some(AuditAction::Warning),
            "INFO" => Some(AuditAction::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit trail entry. Never updated after creation;
/// removed only by retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    /// Acting user; `None` for system-generated events, and nulled
    /// out if the actor is later removed.
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub extra_data: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLog {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub description: String,
    pub extra_data: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Per-action aggregate over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStat {
    pub action: AuditAction,
    pub count: i64,
    pub unique_users: i64,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AuditAction; 12] = [
        AuditAction::Login,
        AuditAction::Logout,
        AuditAction::LoginFailed,
        AuditAction::Create,
        AuditAction::Read,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::ConfigChange,
        AuditAction::PermissionChange,
        AuditAction::Error,
        AuditAction::Warning,
        AuditAction::Info,
    ];

    #[test]
    fn action_names_round_trip() {
        for action in ALL {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn unknown_action_does_not_parse() {
        assert_eq!(AuditAction::parse("SHUTDOWN"), None);
        assert_eq!(AuditAction::parse("login"), None);
    }
}
