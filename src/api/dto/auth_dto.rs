//! Registration, login and token DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::Role;
use crate::service::auth_service::Registration;

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Login email.
    pub email: String,
    /// Password, at least 8 characters.
    pub password: String,
    /// Display name.
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    /// `STUDENT` (default) or `EMPLOYER`.
    #[serde(default)]
    pub role: Option<Role>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role: req.role.unwrap_or(Role::Student),
        }
    }
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Request body for `POST /auth/refresh` and `POST /auth/revoke`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    /// Refresh token returned at login.
    #[serde(alias = "refreshToken", alias = "token")]
    pub refresh_token: String,
}
