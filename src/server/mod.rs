use std::{future::Future, net::SocketAddr, ops::Deref, sync::Arc, time::Duration};

use axum::{
    error_handling::HandleErrorLayer, extract::Request, response::IntoResponse, routing::get,
    BoxError, Json, Router,
};
use error_stack::{Report, ResultExt};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{event, info_span, Level};

use crate::{
    auth::middleware::AuthLayer,
    errors::{panic_handler, HttpError},
    store::{OrganisationStore, UserStore},
    Error,
};

/// Shared state for the server
pub struct ServerStateInner {
    pub organisations: Arc<dyn OrganisationStore>,
}

/// The state passed to every handler
#[derive(Clone)]
pub struct ServerState(Arc<ServerStateInner>);

impl Deref for ServerState {
    type Target = ServerStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Configuration for the server
pub struct Config {
    /// The environment we're running in. Currently this just distinguishes `production` from
    /// everything else.
    pub env: String,
    /// The host to bind to.
    pub host: String,
    /// The port to bind to. Use 0 to pick a random port.
    pub port: u16,
    /// How long to wait before timing out a request
    pub request_timeout: Duration,
    pub organisations: Arc<dyn OrganisationStore>,
    pub users: Arc<dyn UserStore>,
}

/// The server and related information
pub struct Server {
    /// The host the server is bound to
    pub host: String,
    /// The port the server is bound to
    pub port: u16,
    /// The server created by Axum
    pub app: Router,
    /// The listener for the server
    pub listener: TcpListener,
}

impl Server {
    /// Run the server, and perform a graceful shutdown when receiving a ctrl+c (SIGINT or
    /// equivalent).
    pub async fn run(self) -> Result<(), Report<Error>> {
        self.run_with_shutdown_signal(shutdown_signal()).await
    }

    /// Run the server, and shut it down when `shutdown_rx` closes.
    pub async fn run_with_shutdown_signal(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Report<Error>> {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .change_context(Error::ServerStart)?;

        event!(Level::INFO, "Exiting server");
        Ok(())
    }
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "ok" }))
}

async fn handle_middleware_error(err: BoxError) -> axum::response::Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        Error::Timeout.to_response()
    } else {
        Report::new(Error::Middleware)
            .attach_printable(err.to_string())
            .to_response()
    }
}

/// Create the server and return it, ready to run.
pub async fn create_server(config: Config) -> Result<Server, Report<Error>> {
    let production = config.env == "production";

    let state = ServerState(Arc::new(ServerStateInner {
        organisations: config.organisations,
    }));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", crate::models::create_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(panic_handler(production))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &Request| {
                            let request_id = req
                                .headers()
                                .get("x-request-id")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default();

                            info_span!(
                                "request",
                                request_id,
                                method = %req.method(),
                                uri = %req.uri(),
                            )
                        })
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(config.request_timeout)
                .layer(AuthLayer::new(config.users)),
        );

    let bind_ip = config
        .host
        .parse::<std::net::IpAddr>()
        .change_context(Error::ServerStart)
        .attach_printable_lazy(|| format!("Invalid host {}", config.host))?;
    let bind_addr = SocketAddr::from((bind_ip, config.port));
    let listener = TcpListener::bind(bind_addr)
        .await
        .change_context(Error::ServerStart)?;
    let port = listener
        .local_addr()
        .change_context(Error::ServerStart)?
        .port();

    event!(Level::INFO, host = %config.host, port, "Listening");

    Ok(Server {
        host: config.host,
        port,
        app,
        listener,
    })
}

/// Create a future which will resolve when receiving SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            event!(Level::ERROR, error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                event!(Level::ERROR, error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    event!(Level::INFO, "Shutting down server");
}
