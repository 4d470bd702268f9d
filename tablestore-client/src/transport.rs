//! The concrete `RpcTransport` (§4.5/§6): signs one request, sends it over
//! `tablestore-http`, classifies the outcome, and verifies the response's
//! content digest when the server sends one.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use http::{HeaderValue, Request as HttpRequest};
use md5::{Digest, Md5};
use tablestore_api::{Action, Credential, Endpoint, Error};
use tablestore_sdk::ConnectionPool;
use tracing::warn;

use crate::signer::Signer;

const API_VERSION: &str = "2015-12-31";
const USER_AGENT: &str = concat!("tablestore-client-rs/", env!("CARGO_PKG_VERSION"));

fn response_content_md5(body: &[u8]) -> String {
    BASE64.encode(Md5::digest(body))
}

/// Sends one signed HTTP POST per call, bounded by a connection pool and
/// the call's deadline.
pub struct HttpTransport {
    http_client: Arc<dyn tablestore_http::HttpClient>,
    base_url: String,
    endpoint: Endpoint,
    credential: Credential,
    signer: Signer,
    pool: Arc<ConnectionPool>,
    runtime: tokio::runtime::Handle,
}

impl HttpTransport {
    pub fn new(
        http_client: Arc<dyn tablestore_http::HttpClient>,
        endpoint: Endpoint,
        credential: Credential,
        pool: Arc<ConnectionPool>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let base_url = endpoint.url.trim_end_matches('/').to_string();
        let signer = Signer::new(credential.access_key_secret.clone());
        HttpTransport { http_client, base_url, endpoint, credential, signer, pool, runtime }
    }

    fn build_request(
        &self,
        action: Action,
        trace_id: &str,
        body: Vec<u8>,
        content_md5: &str,
    ) -> Result<HttpRequest<Vec<u8>>, Error> {
        let path = action.path();
        let date = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        let mut ots_headers: Vec<(&str, String)> = vec![
            ("x-ots-apiversion", API_VERSION.to_string()),
            ("x-ots-accesskeyid", self.credential.access_key_id.clone()),
            ("x-ots-instancename", self.endpoint.instance_name.clone()),
            ("x-ots-contentmd5", content_md5.to_string()),
            ("x-ots-date", date),
            ("x-ots-sdk-traceid", trace_id.to_string()),
        ];
        if let Some(token) = &self.credential.security_token {
            ots_headers.push(("x-ots-ststoken", token.clone()));
        }

        let header_pairs: Vec<(&str, &str)> =
            ots_headers.iter().map(|(name, value)| (*name, value.as_str())).collect();
        let signature = self.signer.sign(path, &header_pairs);

        let url = format!("{}{}", self.base_url, path);
        let mut builder = HttpRequest::builder()
            .method(http::Method::POST)
            .uri(url)
            .header("content-type", "application/x.pb2")
            .header("accept", "application/x.pb2")
            .header("user-agent", USER_AGENT)
            .header("x-ots-signature", &signature);
        for (name, value) in &ots_headers {
            builder = builder.header(*name, value.as_str());
        }
        builder
            .body(body)
            .map_err(|e| Error::corrupted_response(format!("failed to build request: {e}")))
    }
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.ok_str_lossy())
}

trait HeaderValueExt {
    fn ok_str_lossy(&self) -> Option<&str>;
}

impl HeaderValueExt for HeaderValue {
    fn ok_str_lossy(&self) -> Option<&str> {
        self.to_str().ok()
    }
}

impl tablestore_api::RpcTransport for HttpTransport {
    fn issue(
        &self,
        action: Action,
        trace_id: &str,
        deadline: Instant,
        body: Vec<u8>,
        content_md5: String,
        on_response: Box<dyn FnOnce(tablestore_api::TransportOutcome) + Send>,
    ) {
        let request = match self.build_request(action, trace_id, body, &content_md5) {
            Ok(r) => r,
            Err(err) => {
                on_response(tablestore_api::TransportOutcome::Err(err));
                return;
            }
        };

        let http_client = self.http_client.clone();
        let pool = self.pool.clone();
        let trace_id = trace_id.to_string();

        self.runtime.spawn(async move {
            let outcome = run_request(http_client, pool, request, deadline, &trace_id).await;
            on_response(outcome);
        });
    }
}

async fn run_request(
    http_client: Arc<dyn tablestore_http::HttpClient>,
    pool: Arc<ConnectionPool>,
    request: HttpRequest<Vec<u8>>,
    deadline: Instant,
    trace_id: &str,
) -> tablestore_api::TransportOutcome {
    use tablestore_api::TransportOutcome;

    let now = Instant::now();
    if now >= deadline {
        return TransportOutcome::Err(Error::operation_timeout("deadline already passed"));
    }
    let budget = deadline - now;

    let permit = match tokio::time::timeout(budget, pool.acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(err)) => return TransportOutcome::Err(err),
        Err(_) => return TransportOutcome::Err(Error::no_available_connection(
            "timed out waiting for a free connection slot",
        )),
    };

    let now = Instant::now();
    if now >= deadline {
        drop(permit);
        return TransportOutcome::Err(Error::operation_timeout("deadline passed while queued"));
    }
    let remaining = deadline - now;

    let response = match tokio::time::timeout(remaining, http_client.send(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            drop(permit);
            return TransportOutcome::Err(Error::couldnt_connect(err.to_string()));
        }
        Err(_) => {
            drop(permit);
            return TransportOutcome::Err(Error::operation_timeout("request exceeded its deadline"));
        }
    };
    drop(permit);

    let status = response.status().as_u16() as i32;
    let request_id = header_str(response.headers(), "x-ots-requestid").unwrap_or_default().to_string();
    let expected_md5 = header_str(response.headers(), "x-ots-contentmd5").map(|s| s.to_string());
    let body = response.into_body();

    if let Some(expected) = expected_md5 {
        let actual = response_content_md5(&body);
        if actual != expected {
            warn!(trace_id, expected, actual, "response content-md5 mismatch");
            return TransportOutcome::Err(
                Error::corrupted_response("response content-md5 did not match body").with_request_id(request_id),
            );
        }
    }

    TransportOutcome::Ok { http_status: status, body, request_id }
}
