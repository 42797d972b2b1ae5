use serde::{Deserialize, Serialize};

use super::UserId;

/// An identity known to the service.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub roles: Vec<String>,
}

impl User {
    pub fn new(display_name: impl Into<String>, roles: Vec<String>) -> User {
        User {
            id: UserId::new(),
            display_name: display_name.into(),
            roles,
        }
    }

    /// The projection of this user that is embedded in records they own.
    pub fn summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id,
            display_name: self.display_name.clone(),
        }
    }
}

/// The minimal view of a record's owner: just enough to show who created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(rename = "displayName")]
    pub display_name: String,
}
