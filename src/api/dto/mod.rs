//! Data Transfer Objects for REST request/response serialization.
//!
//! Entity bodies that are already shaped for the wire (job drafts,
//! profile details, company details) live in the domain layer and are
//! used directly. The types here cover the remaining request wrappers
//! and small response envelopes.

pub mod admin_dto;
pub mod application_dto;
pub mod auth_dto;
pub mod chat_dto;
pub mod common_dto;
pub mod company_dto;

pub use admin_dto::*;
pub use application_dto::*;
pub use auth_dto::*;
pub use chat_dto::*;
pub use common_dto::*;
pub use company_dto::*;
