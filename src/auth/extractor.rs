//! Bearer-token extractor for authenticated handlers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::{Role, UserId};
use crate::error::AppError;

/// The caller of an authenticated request.
///
/// Resolved from the `Authorization: Bearer <token>` header. The role is
/// read from the stored account, so promotions and locks take effect
/// without waiting for the token to expire.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Account id.
    pub id: UserId,
    /// Account email.
    pub email: String,
    /// Current role.
    pub role: Role,
}

impl AuthUser {
    /// Fails with 403 unless the caller has one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for any other role.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "role {} may not perform this operation",
                self.role
            )))
        }
    }

    /// `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Returns the token of an `Authorization: Bearer` header, if present.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("Bearer") => {
            let token = token.trim();
            (!token.is_empty()).then_some(token)
        }
        _ => None,
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        state.auth.authenticate(token).await
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(value) {
            headers.insert(AUTHORIZATION, v);
        }
        headers
    }

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn role_checks() {
        let user = AuthUser {
            id: UserId::new(1),
            email: "e@x.io".into(),
            role: Role::Student,
        };
        assert!(user.require_role(&[Role::Student, Role::Admin]).is_ok());
        assert!(matches!(
            user.require_role(&[Role::Employer]),
            Err(AppError::Forbidden(_))
        ));
        assert!(!user.is_admin());
    }
}
