//! Student profile service.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthUser;
use crate::domain::ProfileId;
use crate::domain::profile::{Profile, ProfileDetails};
use crate::error::AppError;
use crate::persistence::Store;

/// Reads and maintains student profiles.
#[derive(Debug, Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// One profile by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids.
    pub async fn get(&self, id: ProfileId) -> Result<Profile, AppError> {
        self.store
            .profile(id)
            .await?
            .ok_or_else(|| AppError::not_found("profile"))
    }

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when the caller has none yet.
    pub async fn own(&self, caller: &AuthUser) -> Result<Profile, AppError> {
        self.store
            .profile_by_user(caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("profile"))
    }

    /// Creates the caller's profile or replaces its fields.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for invalid details.
    pub async fn save_own(
        &self,
        caller: &AuthUser,
        details: ProfileDetails,
    ) -> Result<Profile, AppError> {
        let details = details.validated()?;
        let profile = self.store.upsert_profile(caller.id, details, Utc::now()).await?;
        tracing::info!(profile_id = %profile.id, user_id = %caller.id, "profile saved");
        Ok(profile)
    }

    /// Deletes a profile and its applications.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] unless the caller owns the profile
    /// or is an administrator.
    pub async fn delete(&self, id: ProfileId, caller: &AuthUser) -> Result<(), AppError> {
        let profile = self.get(id).await?;
        if !caller.is_admin() && profile.user_id != caller.id {
            return Err(AppError::forbidden("only the owner can delete this profile"));
        }
        if !self.store.delete_profile(id).await? {
            return Err(AppError::not_found("profile"));
        }
        tracing::info!(profile_id = %id, by = %caller.id, "profile deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserId};
    use crate::persistence::MemoryStore;

    fn caller(id: i64, role: Role) -> AuthUser {
        AuthUser {
            id: UserId::new(id),
            email: format!("u{id}@x.io"),
            role,
        }
    }

    #[tokio::test]
    async fn save_own_is_an_upsert() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        let student = caller(1, Role::Student);
        assert!(matches!(service.own(&student).await, Err(AppError::NotFound(_))));

        let details = ProfileDetails {
            full_name: " Ana ".into(),
            university: Some("HUST".into()),
            ..ProfileDetails::default()
        };
        let Ok(first) = service.save_own(&student, details.clone()).await else {
            panic!("create failed");
        };
        assert_eq!(first.details.full_name, "Ana");

        let Ok(second) = service
            .save_own(
                &student,
                ProfileDetails {
                    major: Some("CS".into()),
                    ..details
                },
            )
            .await
        else {
            panic!("update failed");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(second.details.major.as_deref(), Some("CS"));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service
                .save_own(&caller(1, Role::Student), ProfileDetails::default())
                .await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_owner_or_admin() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        let owner = caller(1, Role::Student);
        let details = ProfileDetails {
            full_name: "Ana".into(),
            ..ProfileDetails::default()
        };
        let Ok(profile) = service.save_own(&owner, details).await else {
            panic!("create failed");
        };
        assert!(matches!(
            service.delete(profile.id, &caller(2, Role::Student)).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(service.delete(profile.id, &caller(3, Role::Admin)).await.is_ok());
        assert!(matches!(service.get(profile.id).await, Err(AppError::NotFound(_))));
    }
}
