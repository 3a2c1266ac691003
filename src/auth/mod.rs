//! Authentication primitives: password hashing, token signing and the
//! request extractor that turns a bearer token into an [`AuthUser`].

pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::{AuthUser, bearer_token};
pub use tokens::{AuthSession, Claims, TokenService};
