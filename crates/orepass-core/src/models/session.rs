//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session row. Tokens are opaque bearer strings issued by the
/// auth layer; the store never interprets their contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub refresh_token: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// `Some` once revoked; revocation is terminal.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Validity is computed at read time, never stored: a session is
    /// valid while unrevoked and unexpired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub session_token: String,
    pub refresh_token: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Must be strictly after the creation instant; the store
    /// enforces this structurally.
    pub expires_at: DateTime<Utc>,
}

/// A successfully validated session joined with its owner, so the
/// caller can build a request principal without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>, revoked_at: Option<DateTime<Utc>>) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_token: "token".into(),
            refresh_token: None,
            ip_address: None,
            user_agent: None,
            expires_at,
            last_activity_at: now,
            created_at: now,
            revoked_at,
        }
    }

    #[test]
    fn unexpired_unrevoked_session_is_valid() {
        let now = Utc::now();
        assert!(session(now + Duration::hours(1), None).is_valid(now));
    }

    #[test]
    fn expired_session_is_invalid() {
        let now = Utc::now();
        assert!(!session(now - Duration::seconds(1), None).is_valid(now));
    }

    #[test]
    fn revoked_session_is_invalid_even_before_expiry() {
        let now = Utc::now();
        assert!(!session(now + Duration::hours(1), Some(now)).is_valid(now));
    }
}
