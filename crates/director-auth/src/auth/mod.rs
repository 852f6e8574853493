pub mod audit;
pub mod cleanup;
pub mod client;
pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod notify;
pub mod password;
pub mod rate_limit;
pub mod refresh;
pub mod sanitize;
pub mod service;
pub mod session;
pub mod token;

pub use client::ClientInfo;
pub use jwt::{AccessClaims, issue_access_token, verify_access_token};
pub use notify::{AccountNotifier, LogNotifier};
pub use password::{PasswordStrength, hash_password, validate_password_strength, verify_password};
pub use rate_limit::{RateLimitDecision, RateLimiter, SlidingWindowLimiter};
pub use sanitize::sanitize_input;
pub use service::AuthService;
pub use token::{generate_opaque_token, hash_token};
