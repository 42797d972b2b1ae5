//! Persistence for organisations and the users that own them.
//!
//! Handlers only see the [OrganisationStore] and [UserStore] traits. [MemoryStore] keeps
//! everything in process and backs the tests; [PgStore] keeps everything in PostgreSQL.

mod memory;
mod postgres;

use async_trait::async_trait;
use error_stack::Report;
pub use memory::MemoryStore;
pub use postgres::PgStore;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::api_key::ApiKeyData,
    models::{
        organisation::{Organisation, OrganisationId, OrganisationPopulated, OrganisationUpdate},
        user::{User, UserId},
    },
};

/// A failure reported by a store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The record was rejected by the store's own schema rules
    #[error("{0}")]
    Validation(String),
    /// A unique constraint was violated
    #[error("Duplicate key")]
    Duplicate,
    /// Anything else, such as a lost connection
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// A best-effort human readable message suitable for returning to a client.
    pub fn client_message(&self) -> String {
        match self {
            StoreError::Validation(message) => message.clone(),
            StoreError::Duplicate => "Unique field already exists".to_string(),
            StoreError::Backend(message) if message.is_empty() => {
                "Something went wrong".to_string()
            }
            StoreError::Backend(message) => message.clone(),
        }
    }
}

/// Document-style access to organisation records.
#[async_trait]
pub trait OrganisationStore: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, organisation: &Organisation) -> Result<(), Report<StoreError>>;

    /// All records, newest first, with owners resolved.
    async fn find_all_populated(&self) -> Result<Vec<OrganisationPopulated>, Report<StoreError>>;

    /// A single record with its owner resolved, if it exists.
    async fn find_by_id_populated(
        &self,
        id: OrganisationId,
    ) -> Result<Option<OrganisationPopulated>, Report<StoreError>>;

    /// Overwrite the writable fields of a record. Returns false if the record does not exist.
    async fn save(
        &self,
        id: OrganisationId,
        update: &OrganisationUpdate,
    ) -> Result<bool, Report<StoreError>>;

    /// Remove a record. Returns false if the record does not exist.
    async fn remove(&self, id: OrganisationId) -> Result<bool, Report<StoreError>>;
}

/// The identities that can own organisations, and the API keys that authenticate them.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), Report<StoreError>>;

    async fn add_api_key(&self, user_id: UserId, key: &ApiKeyData)
        -> Result<(), Report<StoreError>>;

    /// Look up the user that owns an API key, given the key ID and the hash of the full key.
    async fn get_user_by_api_key(
        &self,
        api_key_id: Uuid,
        hash: &[u8],
    ) -> Result<Option<User>, Report<StoreError>>;

    /// Remove a user and their API keys. Organisations they own are left in place, with an owner
    /// reference that no longer resolves.
    async fn remove_user(&self, id: UserId) -> Result<bool, Report<StoreError>>;
}
