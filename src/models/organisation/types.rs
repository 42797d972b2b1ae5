use chrono::{DateTime, SubsecRound, Utc};
use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};

use super::OrganisationId;
use crate::{
    models::user::{OwnerSummary, UserId},
    Error,
};

/// An organisation as it is persisted. The owner is a bare reference which may point at a user
/// that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organisation {
    pub id: OrganisationId,
    pub title: String,
    pub content: String,
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Organisation {
    /// Build a new record owned by `owner` from a validated payload.
    pub fn new(owner: UserId, payload: OrganisationUpdate) -> Organisation {
        Organisation {
            id: OrganisationId::new(),
            title: payload.title,
            content: payload.content,
            owner: Some(owner),
            // Postgres stores microseconds, so match that here.
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Attach an already-resolved owner projection.
    pub fn populate(self, user: Option<OwnerSummary>) -> OrganisationPopulated {
        OrganisationPopulated {
            id: self.id,
            title: self.title,
            content: self.content,
            user,
            created_at: self.created_at,
        }
    }
}

/// An organisation with its owner reference resolved to an [OwnerSummary]. `user` is `None`
/// when the record has no owner or the owner has since been removed.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrganisationPopulated {
    #[serde(rename = "_id")]
    pub id: OrganisationId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub user: Option<OwnerSummary>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

impl OrganisationPopulated {
    /// True iff there is a caller, the record has a resolvable owner, and they are the same
    /// identity.
    pub fn is_owned_by(&self, caller: Option<UserId>) -> bool {
        match (caller, self.user.as_ref()) {
            (Some(caller), Some(owner)) => caller == owner.id,
            _ => false,
        }
    }

    /// Produce the single-record read view for a particular caller.
    pub fn view_for(self, caller: Option<UserId>) -> OrganisationView {
        let is_current_user_owner = self.is_owned_by(caller);
        OrganisationView {
            organisation: self,
            is_current_user_owner,
        }
    }
}

impl Serialize for OrganisationPopulated {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(user) = &self.user {
            let mut state = serializer.serialize_struct("Organisation", 5)?;
            state.serialize_field("_id", &self.id)?;
            state.serialize_field("title", &self.title)?;
            state.serialize_field("content", &self.content)?;
            state.serialize_field("user", user)?;
            state.serialize_field("created", &self.created_at)?;
            state.end()
        } else {
            let mut state = serializer.serialize_struct("Organisation", 4)?;
            state.serialize_field("_id", &self.id)?;
            state.serialize_field("title", &self.title)?;
            state.serialize_field("content", &self.content)?;
            state.serialize_field("created", &self.created_at)?;
            state.end()
        }
    }
}

/// The single-record read response. `isCurrentUserOwner` is computed per request and is never
/// stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrganisationView {
    #[serde(flatten)]
    pub organisation: OrganisationPopulated,
    #[serde(rename = "isCurrentUserOwner")]
    pub is_current_user_owner: bool,
}

/// The request body for both create and update. Anything else in the body, such as an ID or an
/// owner, is ignored.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct OrganisationPayload {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// The writable fields of an organisation, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganisationUpdate {
    pub title: String,
    pub content: String,
}

pub const TITLE_REQUIRED_MESSAGE: &str = "Title cannot be blank";

impl OrganisationPayload {
    /// Trim the fields and check that the title is present.
    pub fn validate(&self) -> Result<OrganisationUpdate, Error> {
        let title = self.title.as_deref().unwrap_or_default().trim();
        if title.is_empty() {
            return Err(Error::Validation(TITLE_REQUIRED_MESSAGE.to_string()));
        }

        Ok(OrganisationUpdate {
            title: title.to_string(),
            content: self
                .content
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    }
}
