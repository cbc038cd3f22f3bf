//! Authentication service — registration, login, logout, refresh,
//! and role management orchestration.
//!
//! The login sequence (credential check → session creation → audit
//! write → last-login update) is deliberately non-atomic: session
//! creation is the commit point, and everything after it is
//! best-effort. A failed audit write is retried once and then logged,
//! never surfaced — availability of authentication outranks
//! completeness of the audit trail.

use chrono::{DateTime, Duration, Utc};
use orepass_core::error::{OrepassError, OrepassResult};
use orepass_core::models::audit::{AuditAction, CreateAuditLog};
use orepass_core::models::role::{AssignOutcome, CreateRole, Role};
use orepass_core::models::session::{CreateSession, Session, ValidatedSession};
use orepass_core::models::user::{CreateUser, User};
use orepass_core::repository::{
    AuditLogRepository, RoleRepository, SessionRepository, UserRepository,
};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;
use crate::validate;

/// Input for the registration flow.
#[derive(Debug)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    /// Raw password; hashed before it reaches the store.
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Input for the refresh-rotation flow.
#[derive(Debug)]
pub struct RefreshInput {
    pub refresh_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Successful login or refresh result. The session row carries both
/// token strings; `roles` is what went into the token claims.
#[derive(Debug)]
pub struct LoginOutput {
    pub session: Session,
    /// Effective role names, highest priority first.
    pub roles: Vec<String>,
}

/// Authentication service.
///
/// Generic over the repository traits so the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U, R, S, A>
where
    U: UserRepository,
    R: RoleRepository,
    S: SessionRepository,
    A: AuditLogRepository,
{
    user_repo: U,
    role_repo: R,
    session_repo: S,
    audit_repo: A,
    config: AuthConfig,
}

impl<U, R, S, A> AuthService<U, R, S, A>
where
    U: UserRepository,
    R: RoleRepository,
    S: SessionRepository,
    A: AuditLogRepository,
{
    pub fn new(user_repo: U, role_repo: R, session_repo: S, audit_repo: A, config: AuthConfig) -> Self {
        Self {
            user_repo,
            role_repo,
            session_repo,
            audit_repo,
            config,
        }
    }

    /// Create a new account.
    ///
    /// All inputs are validated before any storage is touched; the
    /// partial-unique indexes remain the source of truth if a
    /// concurrent registration slips past the existence checks.
    pub async fn register(&self, input: RegisterInput) -> OrepassResult<User> {
        let RegisterInput {
            email,
            username,
            password,
            first_name,
            last_name,
            ip_address,
            user_agent,
        } = input;

        validate::validate_email(&email)?;
        validate::validate_username(&username)?;
        validate::validate_password(&password, self.config.min_password_length)?;

        if self.user_repo.email_exists(&email).await? {
            return Err(OrepassError::Conflict("email is already registered".into()));
        }
        if self.user_repo.username_exists(&username).await? {
            return Err(OrepassError::Conflict("username is already taken".into()));
        }

        let password_hash = password::hash_password(&password, self.config.pepper.as_deref())?;

        let user = self
            .user_repo
            .create(CreateUser {
                email,
                username,
                password_hash,
                first_name,
                last_name,
            })
            .await?;

        self.audit_best_effort(CreateAuditLog {
            user_id: Some(user.id),
            action: AuditAction::Create,
            entity_type: Some("users".into()),
            entity_id: Some(user.id),
            description: format!("user {} registered", user.username),
            extra_data: None,
            ip_address,
            user_agent,
        })
        .await;

        Ok(user)
    }

    /// Authenticate with email + password and mint a session.
    ///
    /// The failure response never distinguishes "no such account"
    /// from "wrong password", and the LOGIN_FAILED audit entry
    /// carries no user id — the presented identity is unconfirmed.
    pub async fn login(&self, input: LoginInput) -> OrepassResult<LoginOutput> {
        let LoginInput {
            email,
            password,
            ip_address,
            user_agent,
        } = input;
        let now = Utc::now();

        // 1. Look up an active, non-deleted user by email.
        let user = match self.user_repo.get_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.audit_login_failed(&email, ip_address, user_agent).await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        // 2. Verify the password.
        let valid =
            password::verify_password(&password, &user.password_hash, self.config.pepper.as_deref())?;
        if !valid {
            self.audit_login_failed(&email, ip_address, user_agent).await;
            return Err(AuthError::InvalidCredentials.into());
        }

        // 3. Effective roles for token embedding.
        let roles = self.role_repo.effective_roles_of(user.id, now).await?;

        // 4. Mint tokens and create the session — the commit point.
        let session_token =
            token::issue_session_token(user.id, &user.email, &user.username, &roles, &self.config)?;
        let refresh_token = token::generate_refresh_token();
        let expires_at = now + Duration::seconds(self.config.session_lifetime_secs as i64);

        let session = self
            .session_repo
            .create(CreateSession {
                user_id: user.id,
                session_token,
                refresh_token: Some(refresh_token),
                ip_address: ip_address.clone(),
                user_agent: user_agent.clone(),
                expires_at,
            })
            .await?;

        // 5. Best-effort bookkeeping.
        self.audit_best_effort(CreateAuditLog {
            user_id: Some(user.id),
            action: AuditAction::Login,
            entity_type: Some("sessions".into()),
            entity_id: Some(session.id),
            description: format!("user {} logged in", user.username),
            extra_data: None,
            ip_address,
            user_agent,
        })
        .await;

        if let Err(e) = self.user_repo.touch_last_login(user.id).await {
            warn!(user_id = %user.id, error = %e, "failed to update last_login_at");
        }

        Ok(LoginOutput { session, roles })
    }

    /// Revoke a session (logout). Returns false if the token was
    /// unknown or already revoked.
    pub async fn logout(&self, session_token: &str) -> OrepassResult<bool> {
        // Resolve the owner before revoking; revocation destroys
        // validity.
        let validated = self.session_repo.validate(session_token, Utc::now()).await?;
        let revoked = self.session_repo.revoke(session_token).await?;

        if revoked {
            self.audit_best_effort(CreateAuditLog {
                user_id: validated.as_ref().map(|v| v.user_id),
                action: AuditAction::Logout,
                entity_type: Some("sessions".into()),
                entity_id: validated.map(|v| v.session_id),
                description: "session revoked on logout".into(),
                extra_data: None,
                ip_address: None,
                user_agent: None,
            })
            .await;
        }

        Ok(revoked)
    }

    /// Rotate a refresh token: revoke the session it belongs to and
    /// mint a replacement pair.
    ///
    /// The old session is revoked before the new one is created, so a
    /// stale refresh token can never validate again.
    pub async fn refresh(&self, input: RefreshInput) -> OrepassResult<LoginOutput> {
        let RefreshInput {
            refresh_token,
            ip_address,
            user_agent,
        } = input;
        let now = Utc::now();

        // 1. The token must belong to a currently valid session.
        let old = self
            .session_repo
            .find_by_refresh_token(&refresh_token, now)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        // 2. Load the owner for claim embedding (fail closed).
        let user = match self.user_repo.get_by_id(old.user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Err(AuthError::AccountInactive.into()),
        };

        // 3. Consume the old session.
        self.session_repo.revoke(&old.session_token).await?;

        // 4. Mint the replacement pair.
        let roles = self.role_repo.effective_roles_of(user.id, now).await?;
        let session_token =
            token::issue_session_token(user.id, &user.email, &user.username, &roles, &self.config)?;
        let new_refresh = token::generate_refresh_token();
        let expires_at = now + Duration::seconds(self.config.session_lifetime_secs as i64);

        let session = self
            .session_repo
            .create(CreateSession {
                user_id: user.id,
                session_token,
                refresh_token: Some(new_refresh),
                ip_address: ip_address.clone(),
                user_agent: user_agent.clone(),
                expires_at,
            })
            .await?;

        self.audit_best_effort(CreateAuditLog {
            user_id: Some(user.id),
            action: AuditAction::Info,
            entity_type: Some("sessions".into()),
            entity_id: Some(session.id),
            description: format!("session refreshed for user {}", user.username),
            extra_data: None,
            ip_address,
            user_agent,
        })
        .await;

        Ok(LoginOutput { session, roles })
    }

    /// Validate a session token against storage (revocation, expiry,
    /// owner account state).
    pub async fn validate_session(
        &self,
        session_token: &str,
    ) -> OrepassResult<Option<ValidatedSession>> {
        self.session_repo.validate(session_token, Utc::now()).await
    }

    /// Change a password after re-verifying the current one. All of
    /// the user's sessions are revoked.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> OrepassResult<()> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(OrepassError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })?;

        let valid = password::verify_password(
            current_password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        validate::validate_password(new_password, self.config.min_password_length)?;
        let password_hash = password::hash_password(new_password, self.config.pepper.as_deref())?;
        self.user_repo.set_password(user_id, &password_hash).await?;

        let revoked = self.session_repo.revoke_all(user_id).await?;

        self.audit_best_effort(CreateAuditLog {
            user_id: Some(user_id),
            action: AuditAction::Update,
            entity_type: Some("users".into()),
            entity_id: Some(user_id),
            description: "password changed".into(),
            extra_data: Some(serde_json::json!({ "sessions_revoked": revoked })),
            ip_address: None,
            user_agent: None,
        })
        .await;

        Ok(())
    }

    /// Active sessions of a user, most recently active first.
    pub async fn list_sessions(&self, user_id: Uuid) -> OrepassResult<Vec<Session>> {
        self.session_repo.list_active(user_id, Utc::now()).await
    }

    // -------------------------------------------------------------------
    // Role management
    // -------------------------------------------------------------------

    /// Create a role after validating its name and priority.
    pub async fn create_role(
        &self,
        input: CreateRole,
        created_by: Option<Uuid>,
    ) -> OrepassResult<Role> {
        validate::validate_role_name(&input.name)?;
        validate::validate_role_priority(input.priority)?;

        let role = self.role_repo.create(input).await?;

        self.audit_best_effort(CreateAuditLog {
            user_id: created_by,
            action: AuditAction::PermissionChange,
            entity_type: Some("roles".into()),
            entity_id: Some(role.id),
            description: format!("role {} created", role.name),
            extra_data: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

        Ok(role)
    }

    /// Grant a role by name. Re-granting an already-held role is a
    /// no-op, audited as such.
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        role_name: &str,
        assigned_by: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> OrepassResult<AssignOutcome> {
        let role = self
            .role_repo
            .find_by_name(role_name)
            .await?
            .ok_or(OrepassError::NotFound {
                entity: "role",
                id: role_name.to_string(),
            })?;

        let outcome = self
            .role_repo
            .assign(user_id, role.id, assigned_by, expires_at)
            .await?;

        let description = match &outcome {
            AssignOutcome::Assigned(_) => format!("role {} assigned", role.name),
            AssignOutcome::AlreadyAssigned => format!("role {} already held", role.name),
        };

        self.audit_best_effort(CreateAuditLog {
            user_id: assigned_by,
            action: AuditAction::PermissionChange,
            entity_type: Some("users".into()),
            entity_id: Some(user_id),
            description,
            extra_data: None,
            ip_address: None,
            user_agent: None,
        })
        .await;

        Ok(outcome)
    }

    /// Remove a role by name. Returns false if the user did not hold
    /// it.
    pub async fn revoke_role(
        &self,
        user_id: Uuid,
        role_name: &str,
        removed_by: Option<Uuid>,
    ) -> OrepassResult<bool> {
        let role = self
            .role_repo
            .find_by_name(role_name)
            .await?
            .ok_or(OrepassError::NotFound {
                entity: "role",
                id: role_name.to_string(),
            })?;

        let removed = self.role_repo.unassign(user_id, role.id).await?;

        if removed {
            self.audit_best_effort(CreateAuditLog {
                user_id: removed_by,
                action: AuditAction::PermissionChange,
                entity_type: Some("users".into()),
                entity_id: Some(user_id),
                description: format!("role {} removed", role.name),
                extra_data: None,
                ip_address: None,
                user_agent: None,
            })
            .await;
        }

        Ok(removed)
    }

    /// Delete a role. System roles are refused here — the registry
    /// itself will delete anything.
    pub async fn delete_role(&self, role_id: Uuid, deleted_by: Option<Uuid>) -> OrepassResult<bool> {
        let Some(role) = self.role_repo.get_by_id(role_id).await? else {
            return Ok(false);
        };

        if role.is_system {
            return Err(OrepassError::Validation(
                "system roles cannot be deleted".into(),
            ));
        }

        let deleted = self.role_repo.delete(role_id).await?;

        if deleted {
            self.audit_best_effort(CreateAuditLog {
                user_id: deleted_by,
                action: AuditAction::PermissionChange,
                entity_type: Some("roles".into()),
                entity_id: Some(role_id),
                description: format!("role {} deleted", role.name),
                extra_data: None,
                ip_address: None,
                user_agent: None,
            })
            .await;
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------
    // Audit helpers
    // -------------------------------------------------------------------

    async fn audit_login_failed(
        &self,
        email: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) {
        // No user id: the presented identity is unconfirmed.
        self.audit_best_effort(CreateAuditLog {
            user_id: None,
            action: AuditAction::LoginFailed,
            entity_type: None,
            entity_id: None,
            description: format!("failed login attempt for {email}"),
            extra_data: None,
            ip_address,
            user_agent,
        })
        .await;
    }

    async fn audit_best_effort(&self, event: CreateAuditLog) {
        let retry = event.clone();
        if let Err(first) = self.audit_repo.record(event).await {
            if let Err(second) = self.audit_repo.record(retry).await {
                warn!(
                    error = %second,
                    first_error = %first,
                    "audit write failed after retry"
                );
            }
        }
    }
}
