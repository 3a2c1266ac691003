//! Access and refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying the user id, email and role.
//! Refresh tokens are opaque random strings; only their SHA-256 digest is
//! persisted, so a leaked table cannot be replayed.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::domain::user::{RefreshToken, User, UserView};
use crate::domain::{Role, UserId};
use crate::error::AppError;

/// JWT claims of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Email at issue time.
    pub email: String,
    /// Role at issue time.
    pub role: Role,
    /// Issuer.
    pub iss: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Parses the subject as a user id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when the subject is not numeric.
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.sub
            .parse::<i64>()
            .map(UserId::new)
            .map_err(|_| AppError::Unauthorized("invalid token subject".into()))
    }
}

/// Token pair handed out by register, login and refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthSession {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Expiry of the access token.
    pub access_token_expires_at: DateTime<Utc>,
    /// Opaque token for `/auth/refresh`.
    pub refresh_token: String,
    /// Expiry of the refresh token.
    pub refresh_token_expires_at: DateTime<Utc>,
    /// Always `Bearer`.
    pub token_type: &'static str,
    /// The authenticated user.
    pub user: UserView,
}

/// Signs and verifies tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Builds the service from the configured secret, issuer and lifetimes.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(&config.jwt_secret),
            decoding_key: DecodingKey::from_secret(&config.jwt_secret),
            validation,
            issuer: config.jwt_issuer.clone(),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes.max(1)),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days.max(1)),
        }
    }

    /// Signs an access token for `user`. Returns the token and its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if signing fails.
    pub fn issue_access(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let expires_at = now + self.access_ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))?;
        Ok((token, expires_at))
    }

    /// Verifies signature, issuer and expiry of an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for any invalid token.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("token has expired".into()),
                _ => AppError::Unauthorized("invalid token".into()),
            })
    }

    /// Creates a refresh token. Returns the plaintext for the client and
    /// the row to persist.
    #[must_use]
    pub fn new_refresh_token(
        &self,
        user: UserId,
        ip: Option<String>,
        now: DateTime<Utc>,
    ) -> (String, RefreshToken) {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let row = RefreshToken {
            token_hash: digest(&plaintext),
            user_id: user,
            expires_at: now + self.refresh_ttl,
            created_at: now,
            created_by_ip: ip,
            revoked_at: None,
            revoked_by_ip: None,
            replaced_by_hash: None,
        };
        (plaintext, row)
    }
}

/// Hex SHA-256 digest of a refresh token.
#[must_use]
pub fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AppConfig::for_tests(std::env::temp_dir()))
    }

    fn user() -> User {
        User {
            id: UserId::new(42),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            full_name: None,
            role: Role::Employer,
            is_locked: false,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let tokens = service();
        let Ok((token, _)) = tokens.issue_access(&user(), Utc::now()) else {
            panic!("issue failed");
        };
        let Ok(claims) = tokens.decode(&token) else {
            panic!("decode failed");
        };
        assert_eq!(claims.user_id().ok(), Some(UserId::new(42)));
        assert_eq!(claims.role, Role::Employer);
        assert_eq!(claims.email, "ana@example.com");
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let tokens = service();
        let issued = Utc::now() - Duration::days(1);
        let Ok((token, _)) = tokens.issue_access(&user(), issued) else {
            panic!("issue failed");
        };
        assert!(matches!(tokens.decode(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn tampered_token_is_unauthorized() {
        let tokens = service();
        let Ok((token, _)) = tokens.issue_access(&user(), Utc::now()) else {
            panic!("issue failed");
        };
        let tampered = format!("{token}x");
        assert!(tokens.decode(&tampered).is_err());
        assert!(tokens.decode("garbage").is_err());
    }

    #[test]
    fn refresh_tokens_store_only_the_digest() {
        let tokens = service();
        let (plain, row) = tokens.new_refresh_token(UserId::new(1), None, Utc::now());
        assert_ne!(plain, row.token_hash);
        assert_eq!(row.token_hash, digest(&plain));
        assert_eq!(row.token_hash.len(), 64);
        let (other, _) = tokens.new_refresh_token(UserId::new(1), None, Utc::now());
        assert_ne!(plain, other);
    }
}
