//! Administration: account locks, user search and the dashboard.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::domain::user::UserView;
use crate::domain::{Page, PageRequest, Role, UserId};
use crate::error::AppError;
use crate::persistence::Store;

/// Number of accounts holding a role.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleCount {
    /// Role.
    pub role: Role,
    /// Accounts.
    pub count: u64,
}

/// Platform-wide counters shown on the admin dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    /// All accounts.
    pub total_users: u64,
    /// Accounts per role; every role is listed.
    pub users_by_role: Vec<RoleCount>,
    /// Registered companies.
    pub total_companies: u64,
    /// Company requests awaiting review.
    pub pending_company_requests: u64,
    /// All job posts.
    pub total_job_posts: u64,
    /// Job posts with status `ACTIVE`.
    pub active_job_posts: u64,
    /// All applications.
    pub total_applications: u64,
}

/// Administrator-only operations on accounts and platform counters.
#[derive(Debug, Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    /// Creates a new `AdminService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Locks or unlocks an account.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOperation`] when an administrator tries
    /// to lock themself and [`AppError::NotFound`] for unknown users.
    pub async fn set_locked(
        &self,
        admin: &AuthUser,
        user: UserId,
        locked: bool,
    ) -> Result<UserView, AppError> {
        if locked && user == admin.id {
            return Err(AppError::InvalidOperation("you cannot lock your own account".into()));
        }
        if !self.store.set_user_locked(user, locked).await? {
            return Err(AppError::not_found("user"));
        }
        tracing::info!(user_id = %user, locked, by = %admin.id, "account lock changed");
        self.store
            .user(user)
            .await?
            .map(UserView::from)
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// Accounts matching `term` over email and full name.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn users(
        &self,
        term: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<UserView>, AppError> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.store.search_users(term, page).await?.map(UserView::from))
    }

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn dashboard(&self) -> Result<DashboardStats, AppError> {
        let by_role = self.store.count_users_by_role().await?;
        let users_by_role: Vec<RoleCount> = [Role::Student, Role::Employer, Role::Admin]
            .into_iter()
            .map(|role| RoleCount {
                role,
                count: by_role
                    .iter()
                    .find(|(r, _)| *r == role)
                    .map_or(0, |(_, c)| *c),
            })
            .collect();
        let (total_job_posts, active_job_posts) = self.store.count_job_posts().await?;
        Ok(DashboardStats {
            total_users: users_by_role.iter().map(|r| r.count).sum(),
            users_by_role,
            total_companies: self.store.count_companies().await?,
            pending_company_requests: self.store.count_pending_company_requests().await?,
            total_job_posts,
            active_job_posts,
            total_applications: self.store.count_applications().await?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::user::NewUser;
    use crate::persistence::MemoryStore;

    async fn seed(store: &Arc<dyn Store>, email: &str, name: &str, role: Role) -> AuthUser {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: String::new(),
                full_name: Some(name.into()),
                role,
            })
            .await
        else {
            panic!("insert user failed");
        };
        AuthUser {
            id: user.id,
            email: user.email,
            role,
        }
    }

    #[tokio::test]
    async fn lock_rules() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let admin = seed(&store, "admin@x.io", "Root", Role::Admin).await;
        let student = seed(&store, "s@x.io", "Stu", Role::Student).await;
        let service = AdminService::new(Arc::clone(&store));

        assert!(matches!(
            service.set_locked(&admin, admin.id, true).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.set_locked(&admin, UserId::new(404), true).await,
            Err(AppError::NotFound(_))
        ));
        let Ok(locked) = service.set_locked(&admin, student.id, true).await else {
            panic!("lock failed");
        };
        assert!(locked.is_locked);
        let Ok(unlocked) = service.set_locked(&admin, student.id, false).await else {
            panic!("unlock failed");
        };
        assert!(!unlocked.is_locked);
    }

    #[tokio::test]
    async fn dashboard_lists_every_role() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed(&store, "admin@x.io", "Root", Role::Admin).await;
        seed(&store, "a@x.io", "Ana", Role::Student).await;
        seed(&store, "b@x.io", "Ben", Role::Student).await;
        let service = AdminService::new(Arc::clone(&store));

        let Ok(stats) = service.dashboard().await else {
            panic!("dashboard failed");
        };
        assert_eq!(stats.total_users, 3);
        let counts: Vec<(Role, u64)> =
            stats.users_by_role.iter().map(|r| (r.role, r.count)).collect();
        assert_eq!(
            counts,
            [(Role::Student, 2), (Role::Employer, 0), (Role::Admin, 1)]
        );
        assert_eq!(stats.total_companies, 0);

        let Ok(found) = service.users(Some("ana"), PageRequest::default()).await else {
            panic!("search failed");
        };
        assert_eq!(found.pagination.total, 1);
    }
}
