use std::any::Any;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use tracing::{event, Level};

use super::http_error::ErrorResponseData;

fn panic_message(err: &(dyn Any + Send + 'static)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    }
}

fn handle_panic(production: bool, err: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic_message(err.as_ref());
    event!(Level::ERROR, panic = %details, "Request handler panicked");

    let body = if production {
        ErrorResponseData::new("Server error")
    } else {
        ErrorResponseData::new(details)
    };

    let body = serde_json::to_string(&body).unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Renders a caught panic as a JSON error response.
#[derive(Clone, Copy, Debug)]
pub struct PanicResponse {
    production: bool,
}

impl ResponseForPanic for PanicResponse {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        handle_panic(self.production, err)
    }
}

/// A middleware that handles panics in the application and returns the error formatted as JSON.
/// If `production` is true, this will return a generic message instead of the panic text.
pub fn panic_handler(production: bool) -> CatchPanicLayer<PanicResponse> {
    CatchPanicLayer::custom(PanicResponse { production })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_hides_details() {
        let response = handle_panic(true, Box::new("secret state"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    async fn panicking_route() -> &'static str {
        panic!("handler exploded")
    }

    async fn call_panicking_route(production: bool) -> (StatusCode, serde_json::Value) {
        use tower::ServiceExt;

        let app = axum::Router::new()
            .route("/", axum::routing::get(panicking_route))
            .layer(panic_handler(production));

        let response = app
            .oneshot(
                axum::extract::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn layer_renders_panics_as_json() {
        let (status, body) = call_panicking_route(false).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "handler exploded");

        let (status, body) = call_panicking_route(true).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Server error");
    }

    #[test]
    fn extracts_panic_text() {
        let err: Box<dyn Any + Send> = Box::new(String::from("it broke"));
        assert_eq!(panic_message(err.as_ref()), "it broke");

        let err: Box<dyn Any + Send> = Box::new(5_u32);
        assert_eq!(panic_message(err.as_ref()), "Unknown panic message");
    }
}
