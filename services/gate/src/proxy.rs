//! Reverse proxy to the back-office application.
//!
//! # Purpose
//! Forwards requests that passed the session gate to the upstream
//! application and relays its response unchanged, minus hop-by-hop headers.
//!
//! # Notes
//! - Request bodies are buffered (capped); response bodies are streamed so
//!   server-sent events and streamed renders reach the browser as they are
//!   produced.
//! - Upstream redirects are relayed to the browser, never followed.
//! - Upstream failures surface as a bare `502 Bad Gateway`.
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
// Bounds the wait for the response head only; bodies may stream indefinitely.
const RESPONSE_HEAD_TIMEOUT: Duration = Duration::from_secs(30);

const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamProxy {
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);
        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(error = %err, "request body rejected");
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        };

        let send = self
            .client
            .request(parts.method, &url)
            .headers(end_to_end(&parts.headers))
            .body(body)
            .send();
        let upstream = match tokio::time::timeout(RESPONSE_HEAD_TIMEOUT, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "upstream request failed");
                return StatusCode::BAD_GATEWAY.into_response();
            }
            Err(_) => {
                tracing::warn!(%url, "upstream response timed out");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let status = upstream.status();
        let headers = end_to_end(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

pub async fn proxy_handler(State(proxy): State<UpstreamProxy>, request: Request) -> Response {
    proxy.forward(request).await
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter() {
        out.remove(name);
    }
    out.remove("keep-alive");
    out
}
