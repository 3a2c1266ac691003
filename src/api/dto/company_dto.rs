//! Company and company-request DTOs.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query for `GET /companies`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompanyListParams {
    /// Substring over name, description, industry and address.
    #[serde(default, alias = "searchTerm", alias = "q")]
    pub term: Option<String>,
    /// `desc` (default) for newest first, `asc` for oldest first.
    #[serde(default)]
    pub sort: Option<String>,
}

impl CompanyListParams {
    /// Whether the listing runs newest first.
    #[must_use]
    pub fn newest_first(&self) -> bool {
        !self
            .sort
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("asc"))
    }
}

/// Request body for `POST /company-requests/{id}/reject`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectCompanyRequest {
    /// Reason shown to the requester.
    #[serde(alias = "rejectionReason")]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_newest_first() {
        assert!(CompanyListParams::default().newest_first());
        let asc = CompanyListParams {
            sort: Some("ASC".into()),
            ..CompanyListParams::default()
        };
        assert!(!asc.newest_first());
    }
}
