//! Company service: registration requests and company management.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthUser;
use crate::domain::company::{Company, CompanyDecision, CompanyDetails, CompanyRequest};
use crate::domain::{CompanyId, CompanyRequestId, Page, PageRequest};
use crate::error::AppError;
use crate::persistence::Store;

/// Orchestrates company requests and company CRUD.
#[derive(Debug, Clone)]
pub struct CompanyService {
    store: Arc<dyn Store>,
}

impl CompanyService {
    /// Creates a new `CompanyService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Files a registration request for review.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for invalid details and
    /// [`AppError::InvalidOperation`] when the caller already owns a
    /// company or has a request pending.
    pub async fn submit_request(
        &self,
        caller: &AuthUser,
        details: CompanyDetails,
    ) -> Result<CompanyRequest, AppError> {
        let details = details.validated()?;
        if self.store.company_by_owner(caller.id).await?.is_some() {
            return Err(AppError::InvalidOperation("you already own a company".into()));
        }
        if self.store.has_pending_company_request(caller.id).await? {
            return Err(AppError::InvalidOperation(
                "you already have a pending company request".into(),
            ));
        }
        let request = self.store.insert_company_request(caller.id, details).await?;
        tracing::info!(request_id = %request.id, requester = %caller.id, "company request submitted");
        Ok(request)
    }

    /// Pending requests, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn pending_requests(
        &self,
        page: PageRequest,
    ) -> Result<Page<CompanyRequest>, AppError> {
        self.store.pending_company_requests(page).await
    }

    /// One request by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids.
    pub async fn request(&self, id: CompanyRequestId) -> Result<CompanyRequest, AppError> {
        self.store
            .company_request(id)
            .await?
            .ok_or_else(|| AppError::not_found("company request"))
    }

    /// Approves a pending request, creating the company.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids and
    /// [`AppError::InvalidOperation`] when the request was already decided.
    pub async fn approve(
        &self,
        id: CompanyRequestId,
        admin: &AuthUser,
    ) -> Result<CompanyRequest, AppError> {
        let request = self
            .store
            .decide_company_request(id, admin.id, CompanyDecision::Approve, Utc::now())
            .await?;
        tracing::info!(
            request_id = %id,
            company_id = ?request.company_id,
            reviewer = %admin.id,
            "company request approved"
        );
        Ok(request)
    }

    /// Rejects a pending request with a reason.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for a blank reason, otherwise as
    /// [`Self::approve`].
    pub async fn reject(
        &self,
        id: CompanyRequestId,
        admin: &AuthUser,
        reason: &str,
    ) -> Result<CompanyRequest, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::invalid("a rejection reason is required"));
        }
        let request = self
            .store
            .decide_company_request(
                id,
                admin.id,
                CompanyDecision::Reject(reason.to_string()),
                Utc::now(),
            )
            .await?;
        tracing::info!(request_id = %id, reviewer = %admin.id, "company request rejected");
        Ok(request)
    }

    /// One company by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids.
    pub async fn get(&self, id: CompanyId) -> Result<Company, AppError> {
        self.store
            .company(id)
            .await?
            .ok_or_else(|| AppError::not_found("company"))
    }

    /// Lists companies, optionally filtered by a search term.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(
        &self,
        term: Option<&str>,
        newest_first: bool,
        page: PageRequest,
    ) -> Result<Page<Company>, AppError> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        self.store.list_companies(term, newest_first, page).await
    }

    /// The caller's own company.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] when the caller owns none.
    pub async fn own(&self, caller: &AuthUser) -> Result<Company, AppError> {
        self.store
            .company_by_owner(caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("company"))
    }

    /// Replaces a company's details.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] unless the caller owns the company
    /// or is an administrator.
    pub async fn update(
        &self,
        id: CompanyId,
        caller: &AuthUser,
        details: CompanyDetails,
    ) -> Result<Company, AppError> {
        let details = details.validated()?;
        let company = self.get(id).await?;
        ensure_owner(&company, caller)?;
        let updated = self
            .store
            .update_company(id, details, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("company"))?;
        tracing::info!(company_id = %id, by = %caller.id, "company updated");
        Ok(updated)
    }

    /// Deletes a company with its job posts.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn delete(&self, id: CompanyId, caller: &AuthUser) -> Result<(), AppError> {
        let company = self.get(id).await?;
        ensure_owner(&company, caller)?;
        if !self.store.delete_company(id).await? {
            return Err(AppError::not_found("company"));
        }
        tracing::info!(company_id = %id, by = %caller.id, "company deleted");
        Ok(())
    }
}

fn ensure_owner(company: &Company, caller: &AuthUser) -> Result<(), AppError> {
    if caller.is_admin() || company.owner_id == caller.id {
        Ok(())
    } else {
        Err(AppError::forbidden("only the owner can modify this company"))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::company::CompanyRequestStatus;
    use crate::domain::user::NewUser;
    use crate::persistence::MemoryStore;

    async fn user(store: &Arc<dyn Store>, email: &str, role: Role) -> AuthUser {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: String::new(),
                full_name: None,
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

    fn details(name: &str) -> CompanyDetails {
        CompanyDetails {
            name: name.into(),
            industry: Some("Retail".into()),
            ..CompanyDetails::default()
        }
    }

    #[tokio::test]
    async fn approval_creates_company_and_promotes_student() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = CompanyService::new(Arc::clone(&store));
        let student = user(&store, "s@x.io", Role::Student).await;
        let admin = user(&store, "admin@x.io", Role::Admin).await;

        let Ok(request) = service.submit_request(&student, details("Acme")).await else {
            panic!("submit failed");
        };
        assert!(matches!(
            service.submit_request(&student, details("Acme 2")).await,
            Err(AppError::InvalidOperation(_))
        ));

        let Ok(decided) = service.approve(request.id, &admin).await else {
            panic!("approve failed");
        };
        assert_eq!(decided.status, CompanyRequestStatus::Approved);
        let Some(company_id) = decided.company_id else {
            panic!("approval should link the company");
        };
        let Ok(company) = service.get(company_id).await else {
            panic!("company missing");
        };
        assert!(company.is_verified);
        assert_eq!(company.owner_id, student.id);

        let Ok(Some(promoted)) = store.user(student.id).await else {
            panic!("user missing");
        };
        assert_eq!(promoted.role, Role::Employer);

        assert!(matches!(
            service.approve(request.id, &admin).await,
            Err(AppError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.submit_request(&student, details("Again")).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn rejection_needs_a_reason() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = CompanyService::new(Arc::clone(&store));
        let student = user(&store, "s@x.io", Role::Student).await;
        let admin = user(&store, "admin@x.io", Role::Admin).await;
        let Ok(request) = service.submit_request(&student, details("Acme")).await else {
            panic!("submit failed");
        };
        assert!(matches!(
            service.reject(request.id, &admin, "  ").await,
            Err(AppError::InvalidRequest(_))
        ));
        let Ok(rejected) = service.reject(request.id, &admin, "duplicate").await else {
            panic!("reject failed");
        };
        assert_eq!(rejected.reject_reason.as_deref(), Some("duplicate"));
        assert!(rejected.company_id.is_none());
    }

    #[tokio::test]
    async fn only_owner_or_admin_can_update() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = CompanyService::new(Arc::clone(&store));
        let owner = user(&store, "o@x.io", Role::Student).await;
        let other = user(&store, "e@x.io", Role::Employer).await;
        let admin = user(&store, "admin@x.io", Role::Admin).await;
        let Ok(request) = service.submit_request(&owner, details("Acme")).await else {
            panic!("submit failed");
        };
        let Ok(decided) = service.approve(request.id, &admin).await else {
            panic!("approve failed");
        };
        let Some(id) = decided.company_id else {
            panic!("no company");
        };

        assert!(matches!(
            service.update(id, &other, details("Hijacked")).await,
            Err(AppError::Forbidden(_))
        ));
        let Ok(updated) = service.update(id, &admin, details("Acme Ltd")).await else {
            panic!("admin update failed");
        };
        assert_eq!(updated.details.name, "Acme Ltd");
        assert!(service.delete(id, &owner).await.is_ok());
        assert!(matches!(service.get(id).await, Err(AppError::NotFound(_))));
    }
}
