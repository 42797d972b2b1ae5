//! A typed HTTP client for the organisations API.

use std::fmt::Display;

use error_stack::{Report, ResultExt};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    errors::ErrorResponseData,
    models::organisation::{
        OrganisationId, OrganisationPayload, OrganisationPopulated, OrganisationView,
    },
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client")]
    Build,
    #[error("Request failed")]
    Request,
    #[error("Failed to decode response")]
    Decode,
    /// The server answered with a non-success status
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Maps create, read, update, delete and list intents onto the HTTP API. Requests are relative to
/// the API root, such as `http://localhost:7823/api`.
#[derive(Clone, Debug)]
pub struct OrganisationsClient {
    base: String,
    client: reqwest::Client,
}

impl OrganisationsClient {
    /// Create a client that makes anonymous requests
    pub fn new(base: impl Into<String>) -> Result<OrganisationsClient, Report<ClientError>> {
        let client = new_client_builder()
            .build()
            .change_context(ClientError::Build)?;

        Ok(OrganisationsClient {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a new client from this one that passes the given API key as a Bearer token.
    pub fn with_api_key(&self, api_key: &str) -> Result<OrganisationsClient, Report<ClientError>> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {api_key}")
                .parse::<HeaderValue>()
                .change_context(ClientError::Build)?,
        );

        let client = new_client_builder()
            .default_headers(headers)
            .build()
            .change_context(ClientError::Build)?;

        Ok(OrganisationsClient {
            base: self.base.clone(),
            client,
        })
    }

    pub async fn list(&self) -> Result<Vec<OrganisationPopulated>, Report<ClientError>> {
        self.send(Method::GET, "organisations", None::<&()>).await
    }

    /// Fetch one record. The identifier is sent as given, so malformed identifiers reach the
    /// server unchanged.
    pub async fn get(&self, id: impl Display) -> Result<OrganisationView, Report<ClientError>> {
        self.send(Method::GET, &format!("organisations/{id}"), None::<&()>)
            .await
    }

    pub async fn create(
        &self,
        payload: &OrganisationPayload,
    ) -> Result<OrganisationPopulated, Report<ClientError>> {
        self.send(Method::POST, "organisations", Some(payload)).await
    }

    pub async fn update(
        &self,
        id: impl Display,
        payload: &OrganisationPayload,
    ) -> Result<OrganisationPopulated, Report<ClientError>> {
        self.send(Method::PUT, &format!("organisations/{id}"), Some(payload))
            .await
    }

    pub async fn delete(
        &self,
        id: impl Display,
    ) -> Result<OrganisationPopulated, Report<ClientError>> {
        self.send(Method::DELETE, &format!("organisations/{id}"), None::<&()>)
            .await
    }

    /// Update the record if it already has an ID, otherwise create it.
    pub async fn save(
        &self,
        id: Option<OrganisationId>,
        payload: &OrganisationPayload,
    ) -> Result<OrganisationPopulated, Report<ClientError>> {
        match id {
            Some(id) => self.update(id, payload).await,
            None => self.create(payload).await,
        }
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, Report<ClientError>> {
        let mut request = self
            .client
            .request(method, format!("{}/{}", self.base, path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.change_context(ClientError::Request)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponseData>(&text)
                .map(|data| data.message.into_owned())
                .unwrap_or(text);
            return Err(Report::new(ClientError::Api { status, message }));
        }

        response.json().await.change_context(ClientError::Decode)
    }
}

fn new_client_builder() -> reqwest::ClientBuilder {
    reqwest::ClientBuilder::new().timeout(std::time::Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_header() {
        let client = OrganisationsClient::new("http://localhost:7823/api/").unwrap();
        assert_eq!(client.base, "http://localhost:7823/api");
        assert!(client.with_api_key("abc.def").is_ok());

        let err = client.with_api_key("bad\nkey").unwrap_err();
        assert!(matches!(err.current_context(), ClientError::Build));
    }
}
