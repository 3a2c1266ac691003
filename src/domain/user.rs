//! User accounts, roles and refresh tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Role carried by every account and by the `role` claim of access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Job seeker; owns a profile and applications.
    Student,
    /// Owns a company and manages its job posts.
    Employer,
    /// Platform operator.
    Admin,
}

impl Role {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Employer => "EMPLOYER",
            Self::Admin => "ADMIN",
        }
    }

    /// Roles that may be chosen on self-registration.
    #[must_use]
    pub const fn is_self_assignable(self) -> bool {
        matches!(self, Self::Student | Self::Employer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Self::Student),
            "EMPLOYER" => Ok(Self::Employer),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// A stored account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Row id.
    pub id: UserId,
    /// Lower-cased login email.
    pub email: String,
    /// Argon2 PHC string; never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Account role.
    pub role: Role,
    /// Locked accounts cannot log in or use existing tokens.
    pub is_locked: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name shown to other users: full name, else email.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.email)
            .to_string()
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Lower-cased email.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Account role.
    pub role: Role,
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    /// Row id.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Account role.
    pub role: Role,
    /// Lock state.
    pub is_locked: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            role: u.role,
            is_locked: u.is_locked,
            created_at: u.created_at,
            last_login_at: u.last_login_at,
        }
    }
}

/// A stored refresh token. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// Hex digest of the opaque token.
    pub token_hash: String,
    /// Owner.
    pub user_id: UserId,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Address that requested the token.
    pub created_by_ip: Option<String>,
    /// Revocation time, if revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Address that revoked the token.
    pub revoked_by_ip: Option<String>,
    /// Digest of the token that replaced this one on rotation.
    pub replaced_by_hash: Option<String>,
}

impl RefreshToken {
    /// A token is usable when it is neither revoked nor expired.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}
