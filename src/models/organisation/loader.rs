use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use error_stack::{Report, ResultExt};
use thiserror::Error;
use tracing::instrument;

use super::{OrganisationId, OrganisationPopulated};
use crate::{errors::WrapReport, server::ServerState, store::OrganisationStore, Error};

/// Why an organisation could not be loaded for a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Organisation is invalid")]
    InvalidIdentifier,
    #[error("No organisation with that identifier has been found")]
    NotFound,
    #[error("{0}")]
    Store(String),
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Error {
        match err {
            LoadError::InvalidIdentifier => Error::InvalidIdentifier,
            LoadError::NotFound => Error::NotFound,
            LoadError::Store(message) => Error::Store(message),
        }
    }
}

/// Resolve a raw path identifier to a stored organisation with its owner populated.
#[instrument(skip(store))]
pub async fn load_organisation(
    store: &dyn OrganisationStore,
    raw_id: &str,
) -> Result<OrganisationPopulated, Report<LoadError>> {
    let id = raw_id
        .parse::<OrganisationId>()
        .change_context(LoadError::InvalidIdentifier)?;

    let found = store.find_by_id_populated(id).await.map_err(|report| {
        let message = report.current_context().client_message();
        report.change_context(LoadError::Store(message))
    })?;

    found.ok_or_else(|| Report::new(LoadError::NotFound))
}

/// The organisation named by the `{id}` path segment, loaded before the handler runs.
pub struct Loaded(pub OrganisationPopulated);

#[async_trait]
impl FromRequestParts<ServerState> for Loaded {
    type Rejection = WrapReport<Error>;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let Path(raw_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                Report::new(Error::InvalidIdentifier).attach_printable(e.body_text())
            })?;

        let organisation = load_organisation(state.organisations.as_ref(), &raw_id)
            .await
            .map_err(|report| {
                let context = Error::from(report.current_context().clone());
                report.change_context(context)
            })?;

        Ok(Loaded(organisation))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        models::{organisation::Organisation, user::User},
        store::{MemoryStore, UserStore},
    };

    #[tokio::test]
    async fn loads_with_owner() {
        let store = MemoryStore::new();
        let owner = User::new("Owner", vec![]);
        store.insert_user(&owner).await.unwrap();
        let org = Organisation {
            id: OrganisationId::new(),
            title: "Loaded".into(),
            content: String::new(),
            owner: Some(owner.id),
            created_at: Utc::now(),
        };
        store.insert(&org).await.unwrap();

        let loaded = load_organisation(&store, &org.id.to_string())
            .await
            .unwrap();
        assert_eq!(loaded.id, org.id);
        assert_eq!(loaded.user, Some(owner.summary()));
    }

    #[tokio::test]
    async fn malformed_identifiers() {
        let store = MemoryStore::new();
        let wrong_prefix = crate::models::user::UserId::new().to_string();
        for raw in ["", "abc", "org_", "org_!!!!", wrong_prefix.as_str()] {
            let err = load_organisation(&store, raw).await.unwrap_err();
            assert_eq!(err.current_context(), &LoadError::InvalidIdentifier, "{raw}");
            assert_eq!(err.current_context().to_string(), "Organisation is invalid");
        }
    }

    #[tokio::test]
    async fn missing_record() {
        let store = MemoryStore::new();
        let err = load_organisation(&store, &OrganisationId::new().to_string())
            .await
            .unwrap_err();
        assert_eq!(err.current_context(), &LoadError::NotFound);
        assert_eq!(
            Error::from(err.current_context().clone()).to_string(),
            "No organisation with that identifier has been found"
        );
    }
}
