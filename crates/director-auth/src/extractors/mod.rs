pub mod auth_user;
pub mod json;

pub use auth_user::{AuthUser, MaybeUser, SessionContext};
pub use json::{Json, ValidatedJson};
