//! Administration DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for `PUT /admin/users/{id}/lock`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LockUserRequest {
    /// `true` to lock, `false` to unlock.
    #[serde(alias = "isLocked")]
    pub locked: bool,
}
