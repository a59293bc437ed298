//! Error types shared by the HTTP backends.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`HttpRemoteError`] failures.
pub type HttpResult<T> = Result<T, HttpRemoteError>;

/// Failures that can occur while talking to the Ledger or the provider over HTTP.
#[derive(Debug, Error)]
pub enum HttpRemoteError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or its response never arrived.
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The remote returned a non-success status code.
    #[error("unexpected response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}
