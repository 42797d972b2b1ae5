use axum::{http::StatusCode, response::IntoResponse};
use error_stack::Report;
use thiserror::Error;

use crate::{errors::HttpError, store::StoreError};

/// The top-level error type for the service. Every failure that reaches an HTTP handler boundary
/// is converted into one of these, and from there into a `{ "message": ... }` response.
#[derive(Debug, Error)]
pub enum Error {
    /// The path identifier does not have the shape of an organisation ID
    #[error("Organisation is invalid")]
    InvalidIdentifier,
    /// The identifier was well-formed but no record exists for it
    #[error("No organisation with that identifier has been found")]
    NotFound,
    /// The caller may not perform this action on this resource
    #[error("User is not authorized")]
    Forbidden,
    /// A required field was missing or a value failed validation
    #[error("{0}")]
    Validation(String),
    /// Any other failure reported by the store
    #[error("{0}")]
    Store(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Internal server error")]
    Middleware,
    #[error("Failed to start server")]
    ServerStart,
    #[error("Database error")]
    Db,
    #[error("Failed to configure tracing")]
    Tracing,
}

impl Error {
    /// Convert a store failure into the client-facing error, keeping the best human-readable
    /// message the store gave us.
    pub fn from_store(err: &StoreError) -> Error {
        match err {
            StoreError::Validation(message) => Error::Validation(message.clone()),
            _ => Error::Store(err.client_message()),
        }
    }
}

impl HttpError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidIdentifier => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            // Store failures are reported as client errors in this service, never as a 500.
            Error::Store(_) => StatusCode::BAD_REQUEST,
            Error::Timeout => StatusCode::REQUEST_TIMEOUT,
            Error::Middleware
            | Error::ServerStart
            | Error::Db
            | Error::Tracing => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Error::InvalidIdentifier => "invalid_identifier",
            Error::NotFound => "not_found",
            Error::Forbidden => "forbidden",
            Error::Validation(_) => "validation",
            Error::Store(_) => "store",
            Error::Timeout => "timeout",
            Error::Middleware => "middleware",
            Error::ServerStart => "server_start",
            Error::Db => "db",
            Error::Tracing => "tracing",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        self.to_response()
    }
}

/// Extension methods for results coming out of the store.
pub trait StoreResultExt<T> {
    /// Change the report context to the matching client-facing [Error].
    fn into_client_error(self) -> Result<T, Report<Error>>;
}

impl<T> StoreResultExt<T> for Result<T, Report<StoreError>> {
    fn into_client_error(self) -> Result<T, Report<Error>> {
        self.map_err(|report| {
            let context = Error::from_store(report.current_context());
            report.change_context(context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            Error::InvalidIdentifier.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::Store("connection refused".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_errors_keep_their_message() {
        let result: Result<(), Report<StoreError>> =
            Err(Report::new(StoreError::Validation("Title cannot be blank".into())));
        let report = result.into_client_error().unwrap_err();
        assert!(matches!(report.current_context(), Error::Validation(_)));
        assert_eq!(report.current_context().to_string(), "Title cannot be blank");

        let result: Result<(), Report<StoreError>> = Err(Report::new(StoreError::Duplicate));
        let report = result.into_client_error().unwrap_err();
        assert_eq!(
            report.current_context().to_string(),
            "Unique field already exists"
        );
    }
}
