//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::PageRequest;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page", alias = "pageNumber")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page", alias = "pageSize")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Clamps the parameters into a [`PageRequest`].
    #[must_use]
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// Optional free-text filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Substring to match.
    #[serde(default, alias = "searchTerm", alias = "q")]
    pub term: Option<String>,
}

/// Body carrying a single count, e.g. unread messages.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountResponse {
    /// The count.
    pub count: i64,
}

/// Generic confirmation body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable confirmation.
    pub message: String,
}

impl MessageResponse {
    /// Wraps a confirmation text.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn pagination_accepts_both_spellings() {
        let Ok(params) = serde_urlencoded::from_str::<PaginationParams>("pageNumber=3&pageSize=500")
        else {
            panic!("query should parse");
        };
        let page = params.request();
        assert_eq!(page.page(), 3);
        assert_eq!(page.per_page(), 100);

        let Ok(params) = serde_urlencoded::from_str::<PaginationParams>("") else {
            panic!("empty query should parse");
        };
        assert_eq!(params.request(), PageRequest::default());
    }
}
