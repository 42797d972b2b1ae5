use std::sync::Arc;

use async_trait::async_trait;
use error_stack::Report;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use tracing::{event, Level};

use crate::{
    auth::ADMIN_ROLE,
    client::OrganisationsClient,
    models::user::User,
    store::{MemoryStore, OrganisationStore},
    util_cmd::create_user,
    Error,
};

/// An HTTP client set up for ease of use in tests. It takes a base URL when constructed and
/// makes all requests relative to that base.
#[derive(Clone, Debug)]
pub struct TestClient {
    pub base: String,
    pub client: reqwest::Client,
}

impl TestClient {
    pub fn new(base: impl Into<String>) -> TestClient {
        TestClient {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a new TestClient from this one that passes the given API key
    /// as a Bearer token.
    pub fn with_api_key(&self, api_key: &str) -> TestClient {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", api_key).parse().unwrap(),
        );

        TestClient {
            base: self.base.clone(),
            client: reqwest::ClientBuilder::new()
                .default_headers(headers)
                .build()
                .expect("Building client"),
        }
    }

    pub fn get(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.get(format!("{}/{}", self.base, url.as_ref()))
    }

    pub fn post(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.post(format!("{}/{}", self.base, url.as_ref()))
    }

    pub fn put(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client.put(format!("{}/{}", self.base, url.as_ref()))
    }

    pub fn delete(&self, url: impl AsRef<str>) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}/{}", self.base, url.as_ref()))
    }
}

/// Extensions for reqwest::Response
#[async_trait]
pub trait ResponseExt {
    /// If the response is an error, log it. This can be used in place of `error_for_status`.
    async fn log_error(self) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl ResponseExt for reqwest::Response {
    async fn log_error(self) -> Result<reqwest::Response, reqwest::Error> {
        if let Err(e) = self.error_for_status_ref() {
            let status = self.status().as_u16();
            let url = self.url().clone();
            let text = self.text().await.unwrap_or_default();
            event!(Level::ERROR, url=%url, %status, response=text);
            Err(e)
        } else {
            Ok(self)
        }
    }
}

/// A user with an API key, and clients that authenticate as them.
pub struct TestUser {
    pub user: User,
    pub api_key: String,
    pub client: TestClient,
    pub api: OrganisationsClient,
}

pub struct BootstrappedData {
    pub admin_user: TestUser,
    pub user: TestUser,
    pub other_user: TestUser,
}

pub struct TestApp {
    /// Hold on to the shutdown signal so the server stays alive
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    /// An anonymous client for the API
    pub client: TestClient,
    /// An anonymous typed client for the API
    pub api: OrganisationsClient,
    pub base_url: String,
    /// Direct access to the data behind the server
    pub store: Arc<MemoryStore>,
    server_task: tokio::task::JoinHandle<Result<(), Report<Error>>>,
}

impl TestApp {
    /// Signal the server to stop and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), Report<Error>> {
        self.shutdown_tx.send(()).ok();
        self.server_task.await.expect("Joining server task")
    }

    async fn add_user(&self, name: &str, roles: Vec<String>) -> TestUser {
        let (user, key) = create_user(self.store.as_ref(), name, roles)
            .await
            .expect("Creating user");

        TestUser {
            user,
            client: self.client.with_api_key(&key.key),
            api: self.api.with_api_key(&key.key).expect("Building client"),
            api_key: key.key,
        }
    }

    /// Give an existing user an API key and return a client that uses it.
    pub async fn user_client(&self, user: &User) -> OrganisationsClient {
        use crate::store::UserStore;

        let key = crate::auth::api_key::ApiKeyData::new();
        self.store
            .add_api_key(user.id, &key)
            .await
            .expect("Adding API key");
        self.api.with_api_key(&key.key).expect("Building client")
    }
}

pub async fn start_app() -> (TestApp, BootstrappedData) {
    start_app_with_organisations(|store| store as Arc<dyn OrganisationStore>).await
}

/// Start the app with the organisation store replaced by whatever `organisations` builds around
/// the in-memory store. Users still live in the in-memory store.
pub async fn start_app_with_organisations(
    organisations: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn OrganisationStore>,
) -> (TestApp, BootstrappedData) {
    crate::tracing_config::test::init();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    // Make the shutdown future resolve to () so the type matches what Axum expects.
    let shutdown_rx = shutdown_rx.map(|_| ());

    let store = Arc::new(MemoryStore::new());

    let config = crate::server::Config {
        env: "test".into(),
        host: "127.0.0.1".into(),
        port: 0, // Bind to random port
        request_timeout: std::time::Duration::from_secs(30),
        organisations: organisations(store.clone()),
        users: store.clone(),
    };

    let server = crate::server::create_server(config)
        .await
        .expect("creating server");

    let base_url = format!("http://{}:{}", server.host, server.port);
    let api_url = format!("{base_url}/api");

    let server_task = tokio::task::spawn(server.run_with_shutdown_signal(shutdown_rx));

    let app = TestApp {
        shutdown_tx,
        client: TestClient::new(api_url.clone()),
        api: OrganisationsClient::new(api_url).expect("Building client"),
        base_url,
        store,
        server_task,
    };

    let bootstrapped = BootstrappedData {
        admin_user: app.add_user("Admin User", vec![ADMIN_ROLE.to_string()]).await,
        user: app.add_user("Regular User", vec![]).await,
        other_user: app.add_user("Other User", vec![]).await,
    };

    (app, bootstrapped)
}
