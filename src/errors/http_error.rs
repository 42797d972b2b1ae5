use std::{borrow::Cow, fmt::Debug, ops::Deref};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

/// An error that can be returned from an HTTP endpoint
pub trait HttpError: ToString + std::fmt::Debug {
    /// The status code that the error should return.
    fn status_code(&self) -> StatusCode;

    /// A short machine-readable name for the error, used when logging.
    fn error_kind(&self) -> &'static str;

    /// Extra detail about this error, which is logged but never sent to the client.
    fn error_detail(&self) -> String {
        String::new()
    }

    /// The status code and body for this error. Most implementors of this trait will not
    /// need to override the default implementation.
    fn response_tuple(&self) -> (StatusCode, ErrorResponseData) {
        let code = self.status_code();
        let message = self.to_string();
        let detail = self.error_detail();

        if code.is_server_error() {
            event!(Level::ERROR, kind = self.error_kind(), status = %code, %message, %detail);
        } else {
            event!(Level::INFO, kind = self.error_kind(), status = %code, %message, %detail);
        }

        (code, ErrorResponseData::new(message))
    }

    /// Convert the error into a [Response]. Most implementors of this trait will not
    /// need to override the default implementation.
    fn to_response(&self) -> Response {
        let (code, json) = self.response_tuple();
        (code, Json(json)).into_response()
    }
}

impl<T> HttpError for Report<T>
where
    T: HttpError + Send + Sync + 'static,
{
    fn status_code(&self) -> StatusCode {
        self.current_context().status_code()
    }

    fn error_kind(&self) -> &'static str {
        self.current_context().error_kind()
    }

    /// Log the entire report as the detail
    fn error_detail(&self) -> String {
        format!("{self:?}")
    }
}

/// The body returned in every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseData {
    /// A human-readable description of the failure
    pub message: Cow<'static, str>,
}

impl ErrorResponseData {
    /// Create a new [ErrorResponseData] with the given message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> ErrorResponseData {
        ErrorResponseData {
            message: message.into(),
        }
    }
}

/// Wraps an error_stack::Report and implements IntoResponse, allowing easy return of a Report<T>
/// from an Axum endpoint.
pub struct WrapReport<T: HttpError + Sync + Send + 'static>(Report<T>);

impl<T: HttpError + Sync + Send + 'static> WrapReport<T> {
    /// Return the wrapped report
    pub fn into_report(self) -> Report<T> {
        self.0
    }
}

impl<T: HttpError + Sync + Send + 'static> IntoResponse for WrapReport<T> {
    fn into_response(self) -> Response {
        self.0.to_response()
    }
}

impl<T: HttpError + Sync + Send + 'static> From<Report<T>> for WrapReport<T> {
    fn from(value: Report<T>) -> Self {
        WrapReport(value)
    }
}

impl<T: HttpError + std::error::Error + Sync + Send + 'static> From<T> for WrapReport<T> {
    fn from(value: T) -> Self {
        WrapReport(Report::from(value))
    }
}

impl<T: HttpError + Sync + Send + 'static> Deref for WrapReport<T> {
    type Target = Report<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: HttpError + Sync + Send + 'static> Debug for WrapReport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
