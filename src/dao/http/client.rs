use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use super::{
    config::HttpConfig,
    error::{HttpRemoteError, HttpResult},
};

/// Thin reqwest wrapper holding the base URL, credentials and timeout of one backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl HttpBackend {
    /// Build the underlying client; the timeout applies to every request.
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| HttpRemoteError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            token: config.token.map(Arc::<str>::from),
        })
    }

    /// Start a request against `path`, relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> HttpResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| HttpRemoteError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(HttpRemoteError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }

    /// Send `builder` and decode a JSON answer.
    pub async fn send_json<T>(&self, path: &str, builder: RequestBuilder) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(path, builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| HttpRemoteError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    /// Send `body` with `method` and only check for a success status.
    pub async fn send_ack<B>(&self, method: Method, path: &str, body: &B) -> HttpResult<()>
    where
        B: ?Sized + Serialize,
    {
        self.send(path, self.request(method, path).json(body))
            .await
            .map(|_| ())
    }

    /// GET `path` and decode it, mapping 404 to `None`.
    pub async fn get_optional<T>(&self, path: &str) -> HttpResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.send_json(path, self.request(Method::GET, path)).await {
            Ok(value) => Ok(Some(value)),
            Err(HttpRemoteError::RequestStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// GET `path` and only check for a success status.
    pub async fn probe(&self, path: &str) -> HttpResult<()> {
        self.send(path, self.request(Method::GET, path))
            .await
            .map(|_| ())
    }
}
