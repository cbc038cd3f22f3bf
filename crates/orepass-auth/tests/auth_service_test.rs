//! Integration tests for the authentication service, running against
//! real repositories over an in-memory database.

use chrono::Utc;
use orepass_auth::config::AuthConfig;
use orepass_auth::service::{AuthService, LoginInput, RefreshInput, RegisterInput};
use orepass_auth::token;
use orepass_core::error::OrepassError;
use orepass_core::models::audit::AuditAction;
use orepass_core::models::role::{AssignOutcome, CreateRole};
use orepass_core::models::user::{UpdateUser, User};
use orepass_core::repository::{
    AuditLogFilter, AuditLogRepository, Pagination, RoleRepository, UserRepository,
};
use orepass_db::repository::{
    SqliteAuditLogRepository, SqliteRoleRepository, SqliteSessionRepository, SqliteUserRepository,
};
use orepass_db::{DbConfig, connect, run_migrations};

type Service = AuthService<
    SqliteUserRepository,
    SqliteRoleRepository,
    SqliteSessionRepository,
    SqliteAuditLogRepository,
>;

struct Harness {
    svc: Service,
    users: SqliteUserRepository,
    roles: SqliteRoleRepository,
    audit: SqliteAuditLogRepository,
}

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".into(),
        jwt_issuer: "orepass-test".into(),
        session_lifetime_secs: 1800,
        pepper: None,
        min_password_length: 8,
    }
}

/// Spin up an in-memory database, run migrations, and build the
/// service over real repositories.
async fn setup() -> Harness {
    let config = DbConfig {
        url: "sqlite::memory:".into(),
        min_connections: 1,
        max_connections: 1,
        acquire_timeout_secs: 5,
    };
    let pool = connect(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();

    let users = SqliteUserRepository::new(pool.clone());
    let roles = SqliteRoleRepository::new(pool.clone());
    let sessions = SqliteSessionRepository::new(pool.clone());
    let audit = SqliteAuditLogRepository::new(pool.clone());

    let svc = AuthService::new(
        users.clone(),
        roles.clone(),
        sessions.clone(),
        audit.clone(),
        test_config(),
    );

    Harness {
        svc,
        users,
        roles,
        audit,
    }
}

fn register_input(email: &str, username: &str, password: &str) -> RegisterInput {
    RegisterInput {
        email: email.into(),
        username: username.into(),
        password: password.into(),
        first_name: None,
        last_name: None,
        ip_address: Some("10.0.0.1".into()),
        user_agent: Some("TestAgent".into()),
    }
}

fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        email: email.into(),
        password: password.into(),
        ip_address: Some("10.0.0.1".into()),
        user_agent: Some("TestAgent".into()),
    }
}

async fn register_alice(h: &Harness) -> User {
    h.svc
        .register(register_input("a@x.com", "alice", "Passw0rd"))
        .await
        .unwrap()
}

async fn count_action(h: &Harness, action: AuditAction) -> i64 {
    h.audit
        .query(
            AuditLogFilter {
                action: Some(action),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap()
        .total
}

#[tokio::test]
async fn register_and_login_happy_path() {
    let h = setup().await;
    let user = register_alice(&h).await;
    assert_eq!(user.email, "a@x.com");
    assert!(user.is_active);

    let output = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    assert_eq!(output.session.user_id, user.id);
    assert!(output.session.refresh_token.is_some());
    assert!(output.roles.is_empty());

    // The stored session token is a verifiable JWT for this user.
    let claims = token::decode_session_token(&output.session.session_token, &test_config()).unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.username, "alice");

    // The session validates against storage, and login bookkeeping
    // happened: last_login_at advanced and a LOGIN entry was written.
    let validated = h
        .svc
        .validate_session(&output.session.session_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(validated.user_id, user.id);

    let reloaded = h.users.get_by_id(user.id).await.unwrap().unwrap();
    assert!(reloaded.last_login_at.is_some());
    assert_eq!(count_action(&h, AuditAction::Login).await, 1);
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() {
    let h = setup().await;
    register_alice(&h).await;

    assert!(h.svc.login(login_input("A@X.COM", "Passw0rd")).await.is_ok());
}

#[tokio::test]
async fn register_rejects_invalid_input() {
    let h = setup().await;

    let err = h
        .svc
        .register(register_input("not-an-email", "alice", "Passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Validation(ref msg) if msg.contains("email")));

    let err = h
        .svc
        .register(register_input("a@x.com", "al", "Passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Validation(ref msg) if msg.contains("username")));

    let err = h
        .svc
        .register(register_input("a@x.com", "alice", "allletters"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Validation(ref msg) if msg.contains("password")));
}

#[tokio::test]
async fn register_duplicate_identifiers_conflict() {
    let h = setup().await;
    register_alice(&h).await;

    let err = h
        .svc
        .register(register_input("A@X.com", "other", "Passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Conflict(ref msg) if msg.contains("email")));

    let err = h
        .svc
        .register(register_input("b@x.com", "Alice", "Passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Conflict(ref msg) if msg.contains("username")));
}

#[tokio::test]
async fn login_failures_are_uniform_and_audited() {
    let h = setup().await;
    register_alice(&h).await;

    // Wrong password on a real account and a nonexistent account
    // produce the same generic outcome.
    let wrong_password = h
        .svc
        .login(login_input("a@x.com", "WrongPass1"))
        .await
        .unwrap_err();
    assert!(matches!(wrong_password, OrepassError::Unauthorized));

    let unknown_email = h
        .svc
        .login(login_input("ghost@x.com", "Passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(unknown_email, OrepassError::Unauthorized));

    // Both wrote LOGIN_FAILED entries, neither with a user id.
    let failures = h
        .audit
        .query(
            AuditLogFilter {
                action: Some(AuditAction::LoginFailed),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(failures.total, 2);
    assert!(failures.items.iter().all(|entry| entry.user_id.is_none()));
}

#[tokio::test]
async fn inactive_user_cannot_login() {
    let h = setup().await;
    let user = register_alice(&h).await;
    h.users
        .update(
            user.id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap_err();
    assert!(matches!(err, OrepassError::Unauthorized));
    assert_eq!(count_action(&h, AuditAction::LoginFailed).await, 1);
}

#[tokio::test]
async fn effective_roles_are_embedded_highest_priority_first() {
    let h = setup().await;
    let user = register_alice(&h).await;

    h.svc
        .create_role(
            CreateRole {
                name: "ADMIN".into(),
                description: None,
                priority: 1000,
                is_system: false,
            },
            None,
        )
        .await
        .unwrap();
    h.svc
        .create_role(
            CreateRole {
                name: "USER".into(),
                description: None,
                priority: 100,
                is_system: false,
            },
            None,
        )
        .await
        .unwrap();

    h.svc.assign_role(user.id, "USER", None, None).await.unwrap();
    h.svc.assign_role(user.id, "ADMIN", None, None).await.unwrap();

    let output = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    assert_eq!(output.roles, ["ADMIN", "USER"]);

    let claims = token::decode_session_token(&output.session.session_token, &test_config()).unwrap();
    assert_eq!(claims.roles, ["ADMIN", "USER"]);
}

#[tokio::test]
async fn assign_role_is_idempotent_and_audited() {
    let h = setup().await;
    let user = register_alice(&h).await;
    h.roles
        .create(CreateRole {
            name: "OPERATOR".into(),
            description: None,
            priority: 500,
            is_system: false,
        })
        .await
        .unwrap();

    let first = h
        .svc
        .assign_role(user.id, "operator", Some(user.id), None)
        .await
        .unwrap();
    assert!(matches!(first, AssignOutcome::Assigned(_)));

    let second = h
        .svc
        .assign_role(user.id, "operator", Some(user.id), None)
        .await
        .unwrap();
    assert!(matches!(second, AssignOutcome::AlreadyAssigned));

    // Both attempts were audited, with distinguishable descriptions.
    let changes = h
        .audit
        .query(
            AuditLogFilter {
                action: Some(AuditAction::PermissionChange),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(changes.total, 2);
    assert!(changes.items.iter().any(|e| e.description.contains("already held")));

    let unknown = h
        .svc
        .assign_role(user.id, "SURVEYOR", None, None)
        .await
        .unwrap_err();
    assert!(matches!(unknown, OrepassError::NotFound { .. }));
}

#[tokio::test]
async fn revoke_role_reports_outcome() {
    let h = setup().await;
    let user = register_alice(&h).await;
    h.roles
        .create(CreateRole {
            name: "OPERATOR".into(),
            description: None,
            priority: 500,
            is_system: false,
        })
        .await
        .unwrap();
    h.svc.assign_role(user.id, "OPERATOR", None, None).await.unwrap();

    assert!(h.svc.revoke_role(user.id, "OPERATOR", None).await.unwrap());
    assert!(!h.svc.revoke_role(user.id, "OPERATOR", None).await.unwrap());
}

#[tokio::test]
async fn delete_role_refuses_system_roles() {
    let h = setup().await;

    let system = h
        .svc
        .create_role(
            CreateRole {
                name: "ROOT".into(),
                description: Some("built-in".into()),
                priority: 1000,
                is_system: true,
            },
            None,
        )
        .await
        .unwrap();
    let plain = h
        .svc
        .create_role(
            CreateRole {
                name: "TEMP".into(),
                description: None,
                priority: 10,
                is_system: false,
            },
            None,
        )
        .await
        .unwrap();

    let err = h.svc.delete_role(system.id, None).await.unwrap_err();
    assert!(matches!(err, OrepassError::Validation(_)));
    assert!(h.roles.get_by_id(system.id).await.unwrap().is_some());

    assert!(h.svc.delete_role(plain.id, None).await.unwrap());
    assert!(h.roles.get_by_id(plain.id).await.unwrap().is_none());
}

#[tokio::test]
async fn create_role_validates_name_and_priority() {
    let h = setup().await;

    let err = h
        .svc
        .create_role(
            CreateRole {
                name: "bad-name".into(),
                description: None,
                priority: 10,
                is_system: false,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Validation(_)));

    let err = h
        .svc
        .create_role(
            CreateRole {
                name: "FINE".into(),
                description: None,
                priority: 2000,
                is_system: false,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Validation(_)));
}

#[tokio::test]
async fn logout_revokes_and_audits() {
    let h = setup().await;
    let user = register_alice(&h).await;
    let output = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    let token = output.session.session_token;

    assert!(h.svc.logout(&token).await.unwrap());
    // Revocation is terminal and idempotent.
    assert!(!h.svc.logout(&token).await.unwrap());
    assert!(h.svc.validate_session(&token).await.unwrap().is_none());

    let logouts = h
        .audit
        .query(
            AuditLogFilter {
                action: Some(AuditAction::Logout),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(logouts.total, 1);
    assert_eq!(logouts.items[0].user_id, Some(user.id));
}

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_old_pair() {
    let h = setup().await;
    register_alice(&h).await;
    let original = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    let old_session_token = original.session.session_token.clone();
    let old_refresh = original.session.refresh_token.clone().unwrap();

    let rotated = h
        .svc
        .refresh(RefreshInput {
            refresh_token: old_refresh.clone(),
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap();
    assert_ne!(rotated.session.session_token, old_session_token);

    // The superseded pair is dead: the old session no longer
    // validates and the old refresh token cannot be replayed.
    assert!(h.svc.validate_session(&old_session_token).await.unwrap().is_none());
    let replay = h
        .svc
        .refresh(RefreshInput {
            refresh_token: old_refresh,
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(replay, OrepassError::Unauthorized));

    // The replacement works.
    assert!(
        h.svc
            .validate_session(&rotated.session.session_token)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn refresh_with_unknown_token_is_unauthorized() {
    let h = setup().await;

    let err = h
        .svc
        .refresh(RefreshInput {
            refresh_token: "never-issued".into(),
            ip_address: None,
            user_agent: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrepassError::Unauthorized));
}

#[tokio::test]
async fn change_password_revokes_all_sessions() {
    let h = setup().await;
    let user = register_alice(&h).await;
    h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    assert_eq!(h.svc.list_sessions(user.id).await.unwrap().len(), 2);

    let wrong = h
        .svc
        .change_password(user.id, "NotCurrent1", "NewPassw0rd")
        .await
        .unwrap_err();
    assert!(matches!(wrong, OrepassError::Unauthorized));

    h.svc
        .change_password(user.id, "Passw0rd", "NewPassw0rd")
        .await
        .unwrap();

    assert!(h.svc.list_sessions(user.id).await.unwrap().is_empty());
    assert!(matches!(
        h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap_err(),
        OrepassError::Unauthorized
    ));
    assert!(h.svc.login(login_input("a@x.com", "NewPassw0rd")).await.is_ok());
}

#[tokio::test]
async fn sessions_list_newest_activity_first() {
    let h = setup().await;
    let user = register_alice(&h).await;
    h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();
    let second = h.svc.login(login_input("a@x.com", "Passw0rd")).await.unwrap();

    let sessions = h.svc.list_sessions(user.id).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.is_valid(Utc::now())));
    assert_eq!(sessions[0].id, second.session.id);
}
