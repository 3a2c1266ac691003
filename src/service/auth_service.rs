//! Account service: registration, login, token rotation and bearer
//! authentication.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::password::{self, validate_password};
use crate::auth::tokens::digest;
use crate::auth::{AuthSession, AuthUser, TokenService};
use crate::domain::user::{NewUser, User, UserView};
use crate::domain::{Role, UserId};
use crate::error::AppError;
use crate::persistence::Store;

/// Same message for unknown email and wrong password.
const BAD_CREDENTIALS: &str = "invalid email or password";

/// Fields accepted on self-registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Requested role; only student or employer.
    pub role: Role,
}

/// Issues and validates credentials.
#[derive(Debug, Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    /// Creates a new `AuthService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a malformed email, a short
    /// password or a role that cannot be self-assigned, and
    /// [`AppError::Conflict`] when the email is taken.
    pub async fn register(
        &self,
        registration: Registration,
        ip: Option<String>,
    ) -> Result<AuthSession, AppError> {
        let email = normalize_email(&registration.email)?;
        validate_password(&registration.password)?;
        if !registration.role.is_self_assignable() {
            return Err(AppError::invalid(format!(
                "role {} cannot be chosen at registration",
                registration.role
            )));
        }

        let password_hash = hash_blocking(registration.password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                full_name: registration
                    .full_name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                role: registration.role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        self.issue_session(user, ip, Utc::now()).await
    }

    /// Verifies credentials and signs the user in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for unknown emails, wrong
    /// passwords and locked accounts.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<AuthSession, AppError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.user_by_email(&email).await? else {
            // Same Argon2 cost as a wrong password.
            let _ = verify_blocking(password.to_string(), password::dummy_hash().to_string()).await;
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        };
        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        if user.is_locked {
            return Err(AppError::Unauthorized("account is locked".into()));
        }

        let now = Utc::now();
        self.store.record_login(user.id, now).await?;
        tracing::info!(user_id = %user.id, "user logged in");
        let user = User {
            last_login_at: Some(now),
            ..user
        };
        self.issue_session(user, ip, now).await
    }

    /// Exchanges a refresh token for a new pair and revokes the old one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when the token is unknown,
    /// expired, revoked, or belongs to a locked or deleted account.
    pub async fn refresh(&self, token: &str, ip: Option<String>) -> Result<AuthSession, AppError> {
        let now = Utc::now();
        let hash = digest(token.trim());
        let stored = self
            .store
            .refresh_token(&hash)
            .await?
            .filter(|t| t.is_active(now))
            .ok_or_else(|| AppError::Unauthorized("invalid refresh token".into()))?;

        let user = self
            .store
            .user(stored.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
        if user.is_locked {
            return Err(AppError::Unauthorized("account is locked".into()));
        }

        let (plaintext, next) = self.tokens.new_refresh_token(user.id, ip.clone(), now);
        let revoked = self
            .store
            .revoke_refresh_token(&hash, now, ip, Some(next.token_hash.clone()))
            .await?;
        if !revoked {
            // Lost a race with another rotation of the same token.
            return Err(AppError::Unauthorized("invalid refresh token".into()));
        }
        let refresh_expires = next.expires_at;
        self.store.insert_refresh_token(next).await?;

        let (access_token, access_expires) = self.tokens.issue_access(&user, now)?;
        tracing::info!(user_id = %user.id, "refresh token rotated");
        Ok(AuthSession {
            access_token,
            access_token_expires_at: access_expires,
            refresh_token: plaintext,
            refresh_token_expires_at: refresh_expires,
            token_type: "Bearer",
            user: UserView::from(user),
        })
    }

    /// Revokes one of the caller's refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown tokens,
    /// [`AppError::Forbidden`] for tokens of another user and
    /// [`AppError::InvalidOperation`] when already revoked.
    pub async fn revoke(
        &self,
        token: &str,
        caller: &AuthUser,
        ip: Option<String>,
    ) -> Result<(), AppError> {
        let hash = digest(token.trim());
        let stored = self
            .store
            .refresh_token(&hash)
            .await?
            .ok_or_else(|| AppError::not_found("refresh token"))?;
        if stored.user_id != caller.id {
            return Err(AppError::forbidden("token belongs to another user"));
        }
        if stored.revoked_at.is_some()
            || !self.store.revoke_refresh_token(&hash, Utc::now(), ip, None).await?
        {
            return Err(AppError::InvalidOperation("token is already revoked".into()));
        }
        tracing::info!(user_id = %caller.id, "refresh token revoked");
        Ok(())
    }

    /// Resolves a bearer token into the calling user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for invalid tokens and for
    /// deleted or locked accounts.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let claims = self.tokens.decode(token)?;
        self.current_user(claims.user_id()?).await
    }

    /// Reloads an account so role changes and locks apply to long-lived
    /// sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for deleted or locked accounts.
    pub async fn current_user(&self, id: UserId) -> Result<AuthUser, AppError> {
        let user = self
            .store
            .user(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
        if user.is_locked {
            return Err(AppError::Unauthorized("account is locked".into()));
        }
        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }

    /// Returns the user id of a valid token without touching the store.
    #[must_use]
    pub fn peek_user_id(&self, token: &str) -> Option<UserId> {
        self.tokens.decode(token).ok()?.user_id().ok()
    }

    /// Returns the caller's account.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the account was deleted.
    pub async fn me(&self, caller: &AuthUser) -> Result<UserView, AppError> {
        self.store
            .user(caller.id)
            .await?
            .map(UserView::from)
            .ok_or_else(|| AppError::not_found("user"))
    }

    async fn issue_session(
        &self,
        user: User,
        ip: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, AppError> {
        let (access_token, access_expires) = self.tokens.issue_access(&user, now)?;
        let (refresh_token, row) = self.tokens.new_refresh_token(user.id, ip, now);
        let refresh_expires = row.expires_at;
        self.store.insert_refresh_token(row).await?;
        Ok(AuthSession {
            access_token,
            access_token_expires_at: access_expires,
            refresh_token,
            refresh_token_expires_at: refresh_expires,
            token_type: "Bearer",
            user: UserView::from(user),
        })
    }
}

/// Trims and lower-cases an email and checks its basic shape.
fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if valid {
        Ok(email)
    } else {
        Err(AppError::invalid("a valid email address is required"))
    }
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
}

async fn verify_blocking(candidate: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || password::verify_password(&candidate, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::MemoryStore;

    fn service() -> (AuthService, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenService::new(&AppConfig::for_tests(std::env::temp_dir())));
        (AuthService::new(Arc::clone(&store), tokens), store)
    }

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            email: email.into(),
            password: "s3cret-password".into(),
            full_name: Some("Ana".into()),
            role,
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let (auth, _) = service();
        let Ok(session) = auth
            .register(registration("  Ana@Example.com ", Role::Student), None)
            .await
        else {
            panic!("register failed");
        };
        assert_eq!(session.user.email, "ana@example.com");
        assert_eq!(session.token_type, "Bearer");

        let Ok(login) = auth.login("ana@example.com", "s3cret-password", None).await else {
            panic!("login failed");
        };
        assert!(login.user.last_login_at.is_some());
        let Ok(caller) = auth.authenticate(&login.access_token).await else {
            panic!("token should authenticate");
        };
        assert_eq!(caller.role, Role::Student);
    }

    #[tokio::test]
    async fn registration_rules() {
        let (auth, _) = service();
        assert!(matches!(
            auth.register(registration("root@example.com", Role::Admin), None).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            auth.register(registration("no-at-sign", Role::Student), None).await,
            Err(AppError::InvalidRequest(_))
        ));
        let mut short = registration("a@b.io", Role::Student);
        short.password = "short".into();
        assert!(auth.register(short, None).await.is_err());

        assert!(auth.register(registration("dup@b.io", Role::Student), None).await.is_ok());
        assert!(matches!(
            auth.register(registration("DUP@b.io", Role::Employer), None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (auth, _) = service();
        assert!(auth.register(registration("a@b.io", Role::Student), None).await.is_ok());
        let Err(AppError::Unauthorized(wrong)) = auth.login("a@b.io", "nope-nope", None).await
        else {
            panic!("expected unauthorized");
        };
        let Err(AppError::Unauthorized(unknown)) =
            auth.login("x@b.io", "s3cret-password", None).await
        else {
            panic!("expected unauthorized");
        };
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn locked_accounts_are_rejected() {
        let (auth, store) = service();
        let Ok(session) = auth.register(registration("a@b.io", Role::Student), None).await else {
            panic!("register failed");
        };
        assert!(matches!(store.set_user_locked(session.user.id, true).await, Ok(true)));
        assert!(matches!(
            auth.login("a@b.io", "s3cret-password", None).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.authenticate(&session.access_token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_stops_working() {
        let (auth, _) = service();
        let Ok(first) = auth.register(registration("a@b.io", Role::Student), None).await else {
            panic!("register failed");
        };
        let Ok(second) = auth.refresh(&first.refresh_token, Some("10.0.0.1".into())).await else {
            panic!("refresh failed");
        };
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(matches!(
            auth.refresh(&first.refresh_token, None).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(auth.refresh(&second.refresh_token, None).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_is_owner_only_and_once() {
        let (auth, _) = service();
        let Ok(ana) = auth.register(registration("ana@b.io", Role::Student), None).await else {
            panic!("register failed");
        };
        let Ok(bob) = auth.register(registration("bob@b.io", Role::Student), None).await else {
            panic!("register failed");
        };
        let Ok(bob_caller) = auth.authenticate(&bob.access_token).await else {
            panic!("auth failed");
        };
        let Ok(ana_caller) = auth.authenticate(&ana.access_token).await else {
            panic!("auth failed");
        };

        assert!(matches!(
            auth.revoke(&ana.refresh_token, &bob_caller, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(auth.revoke(&ana.refresh_token, &ana_caller, None).await.is_ok());
        assert!(matches!(
            auth.revoke(&ana.refresh_token, &ana_caller, None).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            auth.revoke("unknown", &ana_caller, None).await,
            Err(AppError::NotFound(_))
        ));
    }
}
