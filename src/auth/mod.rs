//! Authentication and Authorization
//!
//! Callers authenticate with a Bearer API key. Every request resolves to either an
//! [AuthInfo] or an anonymous caller; nothing here rejects a request outright. Deciding
//! what a caller may do is the job of [policy].

pub mod api_key;
mod extractors;
mod lookup;
pub mod middleware;
pub mod policy;

pub use extractors::*;
pub use lookup::AuthLookup;
use thiserror::Error;

use crate::models::user::{OwnerSummary, User, UserId};

pub const GUEST_ROLE: &str = "guest";
pub const USER_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";

/// An error related to authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// The Bearer token is not shaped like one of our API keys
    #[error("API key is malformed")]
    ApiKeyFormat,
}

/// Information about an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub roles: Vec<String>,
}

impl AuthInfo {
    /// The owner projection for records this caller creates.
    pub fn summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}

impl From<User> for AuthInfo {
    fn from(user: User) -> Self {
        AuthInfo {
            user_id: user.id,
            display_name: user.display_name,
            roles: user.roles,
        }
    }
}
