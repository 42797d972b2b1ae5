use std::sync::Arc;

use axum::{extract::Request, response::Response};
use tower::{Layer, Service};

use super::lookup::AuthLookup;
use crate::store::UserStore;

/// A layer that inserts the auth lookup object into the request, for later
/// use by the [Caller](super::Caller) extractor.
#[derive(Clone)]
pub struct AuthLayer {
    users: Arc<dyn UserStore>,
}

impl AuthLayer {
    /// Create a new AuthLayer that resolves API keys against the given user store
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            users: self.users.clone(),
            inner,
        }
    }
}

/// A middleware service for fetching authorization info
#[derive(Clone)]
pub struct AuthService<S> {
    users: Arc<dyn UserStore>,
    inner: S,
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let lookup = AuthLookup::new(self.users.clone());
        request.extensions_mut().insert(Arc::new(lookup));
        self.inner.call(request)
    }
}
