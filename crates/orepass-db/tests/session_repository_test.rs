//! Integration tests for the session manager using an in-memory
//! database.
//!
//! Expiry-sensitive cases pass a simulated "now" instead of sleeping:
//! validity is computed at read time against the caller's clock.

use chrono::{Duration, Utc};
use orepass_core::error::OrepassError;
use orepass_core::models::session::CreateSession;
use orepass_core::models::user::{CreateUser, UpdateUser};
use orepass_core::repository::{SessionRepository, UserRepository};
use orepass_db::repository::{SqliteSessionRepository, SqliteUserRepository};
use orepass_db::{DbConfig, connect, run_migrations};
use sqlx::SqlitePool;
use uuid::Uuid;

async fn setup() -> (SqlitePool, Uuid) {
    let config = DbConfig {
        url: "sqlite::memory:".into(),
        min_connections: 1,
        max_connections: 1,
        acquire_timeout_secs: 5,
    };
    let pool = connect(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let user = SqliteUserRepository::new(pool.clone())
        .create(CreateUser {
            email: "alice@example.com".into(),
            username: "alice".into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
        })
        .await
        .unwrap();

    (pool, user.id)
}

fn new_session(user_id: Uuid, token: &str) -> CreateSession {
    CreateSession {
        user_id,
        session_token: token.into(),
        refresh_token: Some(format!("refresh-{token}")),
        ip_address: Some("10.0.0.1".into()),
        user_agent: Some("TestAgent".into()),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

#[tokio::test]
async fn create_and_validate() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);

    let session = repo.create(new_session(user_id, "tok-1")).await.unwrap();
    assert!(session.revoked_at.is_none());
    assert!(session.is_valid(Utc::now()));

    let validated = repo.validate("tok-1", Utc::now()).await.unwrap().unwrap();
    assert_eq!(validated.session_id, session.id);
    assert_eq!(validated.user_id, user_id);
    assert_eq!(validated.email, "alice@example.com");
    assert_eq!(validated.username, "alice");

    assert!(repo.validate("unknown", Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn validation_fails_once_expired() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);

    let now = Utc::now();
    repo.create(CreateSession {
        expires_at: now + Duration::seconds(1),
        ..new_session(user_id, "tok-1")
    })
    .await
    .unwrap();

    // Still valid just before the deadline, invalid just after — no
    // stored transition, purely read-time.
    assert!(repo.validate("tok-1", now).await.unwrap().is_some());
    assert!(
        repo.validate("tok-1", now + Duration::seconds(2))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn expiry_before_creation_is_rejected_structurally() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);

    let err = repo
        .create(CreateSession {
            expires_at: Utc::now() - Duration::hours(1),
            ..new_session(user_id, "tok-1")
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrepassError::Validation(_)));
}

#[tokio::test]
async fn duplicate_session_token_conflicts() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);

    repo.create(new_session(user_id, "tok-1")).await.unwrap();
    let err = repo
        .create(CreateSession {
            refresh_token: Some("other-refresh".into()),
            ..new_session(user_id, "tok-1")
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrepassError::Conflict(_)));
}

#[tokio::test]
async fn revoke_is_idempotent_and_terminal() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);
    repo.create(new_session(user_id, "tok-1")).await.unwrap();

    assert!(repo.revoke("tok-1").await.unwrap());
    // Second revocation reports false; the state does not change.
    assert!(!repo.revoke("tok-1").await.unwrap());
    assert!(repo.validate("tok-1", Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn touch_advances_activity_until_revoked() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);
    let session = repo.create(new_session(user_id, "tok-1")).await.unwrap();

    assert!(repo.touch(session.id).await.unwrap());
    let touched = repo.get_by_id(session.id).await.unwrap().unwrap();
    assert!(touched.last_activity_at > session.last_activity_at);

    assert!(repo.revoke("tok-1").await.unwrap());

    // Touch after revoke is a safe no-op.
    assert!(!repo.touch(session.id).await.unwrap());
    let after = repo.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(after.last_activity_at, touched.last_activity_at);
}

#[tokio::test]
async fn validation_fails_closed_for_inactive_or_deleted_owner() {
    let (pool, user_id) = setup().await;
    let users = SqliteUserRepository::new(pool.clone());
    let repo = SqliteSessionRepository::new(pool);
    repo.create(new_session(user_id, "tok-1")).await.unwrap();

    users
        .update(
            user_id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(repo.validate("tok-1", Utc::now()).await.unwrap().is_none());

    users
        .update(
            user_id,
            UpdateUser {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(repo.validate("tok-1", Utc::now()).await.unwrap().is_some());

    users.soft_delete(user_id).await.unwrap();
    assert!(repo.validate("tok-1", Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_refresh_token_applies_validity_rules() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);
    let session = repo.create(new_session(user_id, "tok-1")).await.unwrap();
    let refresh = session.refresh_token.clone().unwrap();

    let found = repo
        .find_by_refresh_token(&refresh, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, session.id);

    repo.revoke("tok-1").await.unwrap();
    assert!(
        repo.find_by_refresh_token(&refresh, Utc::now())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn revoke_all_counts_only_live_sessions() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);
    repo.create(new_session(user_id, "tok-1")).await.unwrap();
    repo.create(new_session(user_id, "tok-2")).await.unwrap();
    repo.create(new_session(user_id, "tok-3")).await.unwrap();
    repo.revoke("tok-3").await.unwrap();

    assert_eq!(repo.revoke_all(user_id).await.unwrap(), 2);
    assert_eq!(repo.revoke_all(user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn list_active_orders_by_recent_activity() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);
    repo.create(new_session(user_id, "tok-1")).await.unwrap();
    let second = repo.create(new_session(user_id, "tok-2")).await.unwrap();
    repo.create(new_session(user_id, "tok-3")).await.unwrap();
    repo.revoke("tok-3").await.unwrap();

    repo.touch(second.id).await.unwrap();

    let active = repo.list_active(user_id, Utc::now()).await.unwrap();
    let tokens: Vec<&str> = active.iter().map(|s| s.session_token.as_str()).collect();
    assert_eq!(tokens, ["tok-2", "tok-1"]);
}

#[tokio::test]
async fn cleanup_removes_sessions_expired_past_grace() {
    let (pool, user_id) = setup().await;
    let repo = SqliteSessionRepository::new(pool);

    let now = Utc::now();
    let session = repo
        .create(CreateSession {
            expires_at: now + Duration::seconds(1),
            ..new_session(user_id, "tok-1")
        })
        .await
        .unwrap();

    // Expired, but within the 7-day grace window: kept.
    assert_eq!(repo.cleanup_expired(now + Duration::days(5)).await.unwrap(), 0);
    assert!(repo.get_by_id(session.id).await.unwrap().is_some());

    // Past the grace window: removed.
    assert_eq!(repo.cleanup_expired(now + Duration::days(9)).await.unwrap(), 1);
    assert!(repo.get_by_id(session.id).await.unwrap().is_none());
}
