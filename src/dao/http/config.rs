use std::time::Duration;

use crate::config::EndpointConfig;

/// Runtime configuration describing how to reach an HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl HttpConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl From<&EndpointConfig> for HttpConfig {
    fn from(endpoint: &EndpointConfig) -> Self {
        let config = Self::new(endpoint.base_url.clone(), endpoint.request_timeout);
        match &endpoint.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}
