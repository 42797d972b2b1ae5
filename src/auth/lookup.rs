use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use error_stack::Report;
use tokio::sync::Mutex;
use tracing::{event, Level};

use super::{api_key::decode_key, AuthInfo};
use crate::store::{StoreError, UserStore};

/// Fetches the caller's identity for a request from the Bearer token, at most once per request.
pub struct AuthLookup {
    info: Mutex<Option<Option<Arc<AuthInfo>>>>,
    users: Arc<dyn UserStore>,
}

impl AuthLookup {
    /// Create a new AuthLookup
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            info: Mutex::new(None),
            users,
        }
    }

    async fn fetch_auth_info(
        &self,
        request: &mut Parts,
    ) -> Result<Option<Arc<AuthInfo>>, Report<StoreError>> {
        let bearer =
            <TypedHeader<Authorization<Bearer>> as FromRequestParts<()>>::from_request_parts(
                request,
                &(),
            )
            .await
            .ok();

        let Some(TypedHeader(Authorization(bearer))) = bearer else {
            return Ok(None);
        };

        let (key_id, hash) = match decode_key(bearer.token()) {
            Ok(decoded) => decoded,
            Err(e) => {
                event!(Level::DEBUG, error = %e, "Ignoring malformed API key");
                return Ok(None);
            }
        };

        let user = self.users.get_user_by_api_key(key_id, &hash).await?;
        if user.is_none() {
            event!(Level::DEBUG, %key_id, "API key did not match a user");
        }

        Ok(user.map(|user| Arc::new(AuthInfo::from(user))))
    }

    /// Return the caller's identity, fetching it if it hasn't yet been fetched for this request.
    /// Missing, malformed and unknown keys all resolve to an anonymous caller.
    pub async fn get_auth_info(
        &self,
        request: &mut Parts,
    ) -> Result<Option<Arc<AuthInfo>>, Report<StoreError>> {
        let mut info = self.info.lock().await;
        if let Some(info) = info.as_ref() {
            return Ok(info.clone());
        }

        let fetched = self.fetch_auth_info(request).await?;
        *info = Some(fetched.clone());

        Ok(fetched)
    }
}
