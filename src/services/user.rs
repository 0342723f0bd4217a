//! Account service
//!
//! Registration, login and sessions, profile settings, password change and
//! the mailed password reset flow. Session tokens and reset tokens are random
//! UUIDs stored server-side; nothing about the signed-in user is kept in
//! process memory.

use crate::db::repositories::{
    is_unique_violation, PasswordResetRepository, SessionRepository, UserRepository,
};
use crate::models::{Account, PasswordReset, Profile, ProfileInput, Session, User, UserRole, MAX_AGE, MIN_AGE};
use crate::services::email::{reset_message, Mailer};
use crate::services::password::{check_new_password, hash_password, verify_password, MIN_PASSWORD_LEN};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;
/// Default reset token lifetime in minutes
const DEFAULT_RESET_MINUTES: i64 = 60;

const INVALID_RESET: &str = "This reset link is invalid or has expired";

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Bad credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Sign-up form
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileInput,
    /// Reader (or guardian) agreed to the terms
    #[serde(default)]
    pub consent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfirmInput {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

/// Account service
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    mailer: Arc<dyn Mailer>,
    session_days: i64,
    reset_minutes: i64,
    public_url: String,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            mailer,
            session_days: DEFAULT_SESSION_DAYS,
            reset_minutes: DEFAULT_RESET_MINUTES,
            public_url: "http://localhost:8080".to_string(),
        }
    }

    pub fn with_session_days(mut self, days: i64) -> Self {
        self.session_days = days;
        self
    }

    pub fn with_reset_minutes(mut self, minutes: i64) -> Self {
        self.reset_minutes = minutes;
        self
    }

    /// Base URL used in mailed links
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Create an account.
    ///
    /// The first account ever registered becomes an admin.
    pub async fn register(&self, input: RegisterInput) -> Result<Account, UserServiceError> {
        let email = normalize_email(&input.email)?;
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if !input.consent {
            return Err(UserServiceError::ValidationError(
                "Consent is required to create an account".to_string(),
            ));
        }
        let profile = build_profile(input.profile, 0, true)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(email.clone(), password_hash, UserRole::User);

        let account = match self.user_repo.create_account(&user, &profile).await {
            Ok(account) => account,
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(format!(
                    "Email '{}' is already registered",
                    email
                )))
            }
            Err(e) => return Err(e.context("Failed to create account").into()),
        };

        tracing::info!(
            "Registered user {} ({}, {})",
            account.user.id,
            account.user.role,
            account.profile.age_group
        );
        Ok(account)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<(Session, Account), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to find user")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash).context("Failed to verify password")? {
            return Err(invalid());
        }

        let account = self
            .user_repo
            .get_account(user.id)
            .await
            .context("Failed to load account")?
            .ok_or_else(|| UserServiceError::NotFound("Profile not found".to_string()))?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((session, account))
    }

    /// Close a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its account.
    ///
    /// Expired sessions are removed and treated as absent.
    pub async fn validate_session(&self, token: &str) -> Result<Option<Account>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(&session.id)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let account = self
            .user_repo
            .get_account(session.user_id)
            .await
            .context("Failed to load account")?;
        Ok(account)
    }

    pub async fn get_account(&self, user_id: i64) -> Result<Account, UserServiceError> {
        self.user_repo
            .get_account(user_id)
            .await
            .context("Failed to load account")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user_id)))
    }

    /// Replace the editable profile fields. A new age re-derives the age group.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: ProfileInput,
    ) -> Result<Profile, UserServiceError> {
        let existing = self.get_account(user_id).await?.profile;
        let mut profile = build_profile(input, user_id, existing.consent_given)?;
        profile.consent_timestamp = existing.consent_timestamp;
        profile.created_at = existing.created_at;

        let updated = self
            .user_repo
            .update_profile(&profile)
            .await
            .context("Failed to update profile")?;
        Ok(updated)
    }

    /// Change the password of a signed-in user
    pub async fn change_password(
        &self,
        user_id: i64,
        input: ChangePasswordInput,
    ) -> Result<(), UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user_id)))?;

        if !verify_password(&input.current_password, &user.password_hash)
            .context("Failed to verify password")?
        {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        check_new_password(&input.new_password, &input.confirm_password)
            .map_err(UserServiceError::ValidationError)?;

        let hash = hash_password(&input.new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user_id, &hash)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Start a password reset.
    ///
    /// Always succeeds so callers cannot probe which emails are registered.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserServiceError> {
        let Some(user) = self
            .user_repo
            .get_by_email(email.trim())
            .await
            .context("Failed to find user")?
        else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let now = Utc::now();
        let reset = PasswordReset {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::minutes(self.reset_minutes),
            created_at: now,
        };
        self.reset_repo
            .create(&reset)
            .await
            .context("Failed to store reset token")?;

        if !self.mailer.is_enabled() {
            tracing::warn!(
                "Mail is not configured; password reset for user {} was not delivered",
                user.id
            );
            return Ok(());
        }

        let (subject, body) = reset_message(&self.public_url, &reset.token, self.reset_minutes);
        if let Err(e) = self.mailer.send(&user.email, &subject, &body).await {
            tracing::error!("Failed to send password reset mail to user {}: {:#}", user.id, e);
        }
        Ok(())
    }

    /// Finish a password reset with a mailed token.
    ///
    /// The token is consumed and every session of the user is closed.
    pub async fn confirm_password_reset(
        &self,
        input: ResetConfirmInput,
    ) -> Result<(), UserServiceError> {
        check_new_password(&input.password, &input.confirm_password)
            .map_err(UserServiceError::ValidationError)?;

        let reset = self
            .reset_repo
            .get(input.token.trim())
            .await
            .context("Failed to get reset token")?
            .ok_or_else(|| UserServiceError::ValidationError(INVALID_RESET.to_string()))?;

        // Consuming first makes the token single use even under concurrent confirms
        let consumed = self
            .reset_repo
            .consume(&reset.token)
            .await
            .context("Failed to consume reset token")?;
        if !consumed || reset.is_expired() {
            return Err(UserServiceError::ValidationError(INVALID_RESET.to_string()));
        }

        let hash = hash_password(&input.password).context("Failed to hash password")?;
        self.user_repo
            .update_password(reset.user_id, &hash)
            .await
            .context("Failed to update password")?;
        self.reset_repo
            .delete_by_user(reset.user_id)
            .await
            .context("Failed to clear reset tokens")?;
        let closed = self
            .session_repo
            .delete_by_user(reset.user_id)
            .await
            .context("Failed to close sessions")?;

        tracing::info!("Password reset for user {}, closed {} session(s)", reset.user_id, closed);
        Ok(())
    }

    /// All accounts for the staff list, newest first
    pub async fn list_accounts(&self) -> Result<Vec<Account>, UserServiceError> {
        Ok(self
            .user_repo
            .list_accounts()
            .await
            .context("Failed to list accounts")?)
    }

    /// Change another user's role. Admins cannot change their own role.
    pub async fn set_role(
        &self,
        actor: &Account,
        user_id: i64,
        role: UserRole,
    ) -> Result<Account, UserServiceError> {
        if actor.user.id == user_id {
            return Err(UserServiceError::Forbidden(
                "You cannot change your own role".to_string(),
            ));
        }
        self.get_account(user_id).await?;

        self.user_repo
            .set_role(user_id, role)
            .await
            .context("Failed to set role")?;
        tracing::info!("User {} set role of user {} to {}", actor.user.id, user_id, role);
        self.get_account(user_id).await
    }

    /// Purge expired sessions and reset tokens
    pub async fn cleanup_expired(&self) -> Result<(u64, u64), UserServiceError> {
        let now = Utc::now();
        let sessions = self
            .session_repo
            .delete_expired(now)
            .await
            .context("Failed to delete expired sessions")?;
        let resets = self
            .reset_repo
            .delete_expired(now)
            .await
            .context("Failed to delete expired reset tokens")?;
        Ok((sessions, resets))
    }
}

fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(UserServiceError::ValidationError(
            "A valid email address is required".to_string(),
        )),
    }
}

fn build_profile(
    input: ProfileInput,
    user_id: i64,
    consent_given: bool,
) -> Result<Profile, UserServiceError> {
    if input.full_name.trim().is_empty() {
        return Err(UserServiceError::ValidationError("Full name is required".to_string()));
    }
    input.into_profile(user_id, consent_given).ok_or_else(|| {
        UserServiceError::ValidationError(format!("Age must be between {} and {}", MIN_AGE, MAX_AGE))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mailer that keeps every message in memory
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingMailer {
        /// Reset token from the last mail sent
        pub fn last_token(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            let (_, _, body) = sent.last()?;
            let start = body.find("token=")? + "token=".len();
            Some(body[start..].split_whitespace().next()?.to_string())
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    pub fn register_input(email: &str, age: i32) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            profile: ProfileInput {
                full_name: format!("Reader {}", email),
                age,
                guardian_name: Some("Guardian".to_string()),
                country: Some("India".to_string()),
                ..ProfileInput::default()
            },
            consent: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{register_input, RecordingMailer};
    use super::*;
    use crate::db::repositories::{SqlxPasswordResetRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::AgeGroup;

    async fn setup_test_service() -> (DynDatabasePool, UserService, Arc<RecordingMailer>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let mailer = Arc::new(RecordingMailer::default());
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            mailer.clone(),
        )
        .with_public_url("https://meteor.example");

        (pool, service, mailer)
    }

    fn login(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_first_account_is_admin_then_users() {
        let (_pool, service, _) = setup_test_service().await;

        let first = service.register(register_input("staff@example.com", 24)).await.unwrap();
        let second = service.register(register_input("kid@example.com", 8)).await.unwrap();

        assert_eq!(first.user.role, UserRole::Admin);
        assert_eq!(second.user.role, UserRole::User);
        assert_eq!(second.profile.age_group, AgeGroup::Preteens);
        assert_eq!(second.profile.guardian_name.as_deref(), Some("Guardian"));
        assert!(first.profile.guardian_name.is_none());
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_rejects_duplicates() {
        let (_pool, service, _) = setup_test_service().await;

        let account = service.register(register_input("  Mixed@Example.com ", 15)).await.unwrap();
        assert_eq!(account.user.email, "mixed@example.com");

        let result = service.register(register_input("mixed@example.com", 15)).await;
        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_pool, service, _) = setup_test_service().await;

        let mut no_at = register_input("nobody.example.com", 15);
        no_at.email = "nobody.example.com".to_string();
        assert!(matches!(service.register(no_at).await, Err(UserServiceError::ValidationError(_))));

        let mut short = register_input("short@example.com", 15);
        short.password = "12345".to_string();
        assert!(matches!(service.register(short).await, Err(UserServiceError::ValidationError(_))));

        let too_old = register_input("old@example.com", 26);
        assert!(matches!(service.register(too_old).await, Err(UserServiceError::ValidationError(_))));

        let mut no_consent = register_input("consent@example.com", 15);
        no_consent.consent = false;
        assert!(matches!(service.register(no_consent).await, Err(UserServiceError::ValidationError(_))));

        let mut no_name = register_input("name@example.com", 15);
        no_name.profile.full_name = "   ".to_string();
        assert!(matches!(service.register(no_name).await, Err(UserServiceError::ValidationError(_))));
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service, _) = setup_test_service().await;
        let account = service.register(register_input("reader@example.com", 16)).await.unwrap();

        let (session, logged_in) = service
            .login(login("reader@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, account.user.id);

        let validated = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.profile.age_group, AgeGroup::Teens);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_fails() {
        let (_pool, service, _) = setup_test_service().await;
        service.register(register_input("reader@example.com", 16)).await.unwrap();

        let wrong = service.login(login("reader@example.com", "nope-nope")).await;
        assert!(matches!(wrong, Err(UserServiceError::AuthenticationError(_))));

        let unknown = service.login(login("ghost@example.com", "password123")).await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (pool, service, _) = setup_test_service().await;
        let account = service.register(register_input("old@example.com", 20)).await.unwrap();

        let now = Utc::now();
        let expired = Session {
            id: "expired-token".to_string(),
            user_id: account.user.id,
            expires_at: now - Duration::hours(1),
            created_at: now - Duration::days(8),
        };
        let sessions = SqlxSessionRepository::new(pool.clone());
        sessions.create(&expired).await.unwrap();

        assert!(service.validate_session("expired-token").await.unwrap().is_none());
        assert!(sessions.get_by_id("expired-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_days_setting() {
        let (_pool, service, _) = setup_test_service().await;
        let service = service.with_session_days(1);
        service.register(register_input("brief@example.com", 20)).await.unwrap();

        let (session, _) = service.login(login("brief@example.com", "password123")).await.unwrap();
        let lifetime = session.expires_at - session.created_at;
        assert_eq!(lifetime, Duration::days(1));
    }

    // ========================================================================
    // Profile and password
    // ========================================================================

    #[tokio::test]
    async fn test_update_profile_rederives_age_group() {
        let (_pool, service, _) = setup_test_service().await;
        let account = service.register(register_input("grow@example.com", 12)).await.unwrap();

        let updated = service
            .update_profile(
                account.user.id,
                ProfileInput {
                    full_name: "Grown Reader".to_string(),
                    age: 18,
                    guardian_name: Some("Still here?".to_string()),
                    ..ProfileInput::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.age_group, AgeGroup::YoungAdults);
        assert!(updated.guardian_name.is_none());
        assert!(updated.consent_given);
        assert_eq!(updated.consent_timestamp, account.profile.consent_timestamp);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (_pool, service, _) = setup_test_service().await;
        let account = service.register(register_input("pw@example.com", 20)).await.unwrap();

        let wrong_current = service
            .change_password(
                account.user.id,
                ChangePasswordInput {
                    current_password: "not-it".to_string(),
                    new_password: "newpass1".to_string(),
                    confirm_password: "newpass1".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong_current, Err(UserServiceError::AuthenticationError(_))));

        service
            .change_password(
                account.user.id,
                ChangePasswordInput {
                    current_password: "password123".to_string(),
                    new_password: "newpass1".to_string(),
                    confirm_password: "newpass1".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(service.login(login("pw@example.com", "newpass1")).await.is_ok());
        assert!(service.login(login("pw@example.com", "password123")).await.is_err());
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    #[tokio::test]
    async fn test_reset_flow_is_single_use_and_signs_out() {
        let (_pool, service, mailer) = setup_test_service().await;
        service.register(register_input("forgot@example.com", 17)).await.unwrap();
        let (session, _) = service.login(login("forgot@example.com", "password123")).await.unwrap();

        service.request_password_reset("forgot@example.com").await.unwrap();
        {
            let sent = mailer.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, "forgot@example.com");
            assert!(sent[0].2.contains("https://meteor.example/auth?reset=true&token="));
        }
        let token = mailer.last_token().expect("token in mail");

        let confirm = |password: &str| ResetConfirmInput {
            token: token.clone(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        };

        service.confirm_password_reset(confirm("brandnew")).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.login(login("forgot@example.com", "brandnew")).await.is_ok());

        let reused = service.confirm_password_reset(confirm("another1")).await;
        assert!(matches!(reused, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email_succeeds_silently() {
        let (_pool, service, mailer) = setup_test_service().await;

        service.request_password_reset("ghost@example.com").await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected() {
        let (_pool, service, mailer) = setup_test_service().await;
        let service = service.with_reset_minutes(-1);
        service.register(register_input("late@example.com", 19)).await.unwrap();

        service.request_password_reset("late@example.com").await.unwrap();
        let token = mailer.last_token().unwrap();

        let result = service
            .confirm_password_reset(ResetConfirmInput {
                token,
                password: "whatever".to_string(),
                confirm_password: "whatever".to_string(),
            })
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_reset_rejects_mismatched_confirmation() {
        let (_pool, service, _) = setup_test_service().await;
        let result = service
            .confirm_password_reset(ResetConfirmInput {
                token: "anything".to_string(),
                password: "abcdef".to_string(),
                confirm_password: "abcdeg".to_string(),
            })
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    // ========================================================================
    // Admin
    // ========================================================================

    #[tokio::test]
    async fn test_set_role() {
        let (_pool, service, _) = setup_test_service().await;
        let admin = service.register(register_input("boss@example.com", 25)).await.unwrap();
        let reader = service.register(register_input("r@example.com", 15)).await.unwrap();

        let own = service.set_role(&admin, admin.user.id, UserRole::User).await;
        assert!(matches!(own, Err(UserServiceError::Forbidden(_))));

        let promoted = service.set_role(&admin, reader.user.id, UserRole::Admin).await.unwrap();
        assert!(promoted.is_admin());

        let missing = service.set_role(&admin, 999, UserRole::Admin).await;
        assert!(matches!(missing, Err(UserServiceError::NotFound(_))));

        assert_eq!(service.list_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (pool, service, _) = setup_test_service().await;
        let account = service.register(register_input("c@example.com", 20)).await.unwrap();

        let now = Utc::now();
        SqlxSessionRepository::new(pool.clone())
            .create(&Session {
                id: "stale".to_string(),
                user_id: account.user.id,
                expires_at: now - Duration::minutes(1),
                created_at: now - Duration::days(7),
            })
            .await
            .unwrap();

        let (sessions, resets) = service.cleanup_expired().await.unwrap();
        assert_eq!((sessions, resets), (1, 0));
    }
}
