use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use error_stack::Report;

use super::{lookup::AuthLookup, AuthInfo};
use crate::{
    error::StoreResultExt,
    errors::WrapReport,
    models::user::UserId,
    Error,
};

/// The identity behind a request, or `None` for an anonymous caller. This never rejects a
/// request on its own; access decisions are made by [check](super::policy::check).
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Arc<AuthInfo>>);

impl Caller {
    pub fn info(&self) -> Option<&AuthInfo> {
        self.0.as_deref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.0.as_ref().map(|info| info.user_id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = WrapReport<Error>;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let info = get_auth_info_from_parts(parts).await?;
        Ok(Caller(info))
    }
}

/// Extract the caller's identity from Request [Parts]. A request that never passed through the
/// [AuthLayer](super::middleware::AuthLayer) is anonymous.
pub async fn get_auth_info_from_parts(
    parts: &mut Parts,
) -> Result<Option<Arc<AuthInfo>>, Report<Error>> {
    let Some(auth_lookup) = parts.extensions.get::<Arc<AuthLookup>>().cloned() else {
        return Ok(None);
    };

    auth_lookup.get_auth_info(parts).await.into_client_error()
}
