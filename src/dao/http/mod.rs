//! Shared reqwest plumbing for the HTTP Ledger and provider backends.

mod client;
mod config;
mod error;

pub use client::HttpBackend;
pub use config::HttpConfig;
pub use error::{HttpRemoteError, HttpResult};

use crate::dao::remote::RemoteError;

impl From<HttpRemoteError> for RemoteError {
    fn from(err: HttpRemoteError) -> Self {
        match err {
            HttpRemoteError::RequestStatus { status, ref path } if is_transient_status(status) => {
                let message = format!("{path} answered {status}");
                RemoteError::unavailable(message, err)
            }
            HttpRemoteError::RequestStatus { status, path } => {
                RemoteError::rejected(status.as_u16(), format!("{path} answered {status}"))
            }
            HttpRemoteError::RequestSend { ref source, .. } if source.is_timeout() => {
                RemoteError::Timeout {
                    message: err.to_string(),
                }
            }
            HttpRemoteError::DecodeResponse { .. } => RemoteError::Malformed {
                message: err.to_string(),
                source: Box::new(err),
            },
            other => RemoteError::unavailable(other.to_string(), other),
        }
    }
}

/// Statuses meaning the Ledger itself was not reached or is shedding load.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    use reqwest::StatusCode;

    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
