pub mod auth;
pub mod error_policy;

pub use auth::{auth_gate, AuthUser};
pub use error_policy::error_policy;
