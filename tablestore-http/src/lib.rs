//! A minimal interface necessary for sending a request and getting a
//! response over HTTP.
//!
//! Callers of the table store client sometimes run on a runtime, or with a
//! TLS stack, that isn't `reqwest`'s default. This trait lets them bring
//! their own client; the `reqwest` feature (on by default) provides one.

use async_trait::async_trait;
use http::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("http client error: {0}")]
    Client(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Sends one HTTP request and returns its response, headers included.
///
/// Implementations should not inspect the status code to decide success or
/// failure — a non-2xx response with a readable body is still `Ok`; only a
/// failure to get any response at all (connection refused, TLS error, body
/// read failure) is `Err`.
#[async_trait]
pub trait HttpClient: std::fmt::Debug + Send + Sync {
    async fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpError>;
}

#[cfg(feature = "reqwest")]
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
    pub fn new(inner: reqwest::Client) -> Self {
        ReqwestHttpClient { inner }
    }
}

#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
    fn default() -> Self {
        ReqwestHttpClient { inner: reqwest::Client::new() }
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, HttpError> {
        let (parts, body) = request.into_parts();
        let url = parts.uri.to_string();
        let mut builder = self.inner.request(parts.method, url);
        for (name, value) in parts.headers.iter() {
            builder = builder.header(name, value);
        }
        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| HttpError::Client(Box::new(e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::Client(Box::new(e)))?;

        let mut builder = Response::builder().status(status);
        if let Some(response_headers) = builder.headers_mut() {
            *response_headers = headers;
        }
        builder
            .body(body.to_vec())
            .map_err(|e| HttpError::Client(Box::new(e)))
    }
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
    use super::*;

    #[test]
    fn default_client_is_constructible() {
        let _client = ReqwestHttpClient::default();
    }
}
