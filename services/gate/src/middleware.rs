//! Axum middleware applying [`SessionGate`] verdicts.
//!
//! # Purpose
//! Runs before any route handler: forwards the request, forwards it and
//! attaches the renewed session cookie, or short-circuits with a redirect.
//!
//! # Security considerations
//! - The request path is rewritten to its canonical form before the gate
//!   sees it, so the path that was classified is the path that is forwarded.
//! - Redirects carry no body and no hint of why the session was rejected.
use crate::cookies::append_access_token_cookie;
use crate::gate::{SessionGate, Verdict};
use crate::routes::CanonicalPath;
use axum::extract::{Request, State};
use axum::http::uri::PathAndQuery;
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

pub async fn session_gate(
    State(gate): State<SessionGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = CanonicalPath::parse(request.uri().path()).encoded();
    if path != request.uri().path() {
        match with_path(request.uri(), &path) {
            Ok(uri) => {
                tracing::debug!(raw = %request.uri().path(), canonical = %path, "path canonicalized");
                *request.uri_mut() = uri;
            }
            Err(err) => {
                tracing::debug!(error = %err, "canonical path rejected");
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    }

    match gate.evaluate(&path, request.headers()).await {
        Verdict::Forward => next.run(request).await,
        Verdict::ForwardRenewed(token) => {
            let mut response = next.run(request).await;
            append_access_token_cookie(response.headers_mut(), &token);
            response
        }
        Verdict::Redirect { location, renewed } => {
            let mut response = Redirect::temporary(&location).into_response();
            if let Some(token) = renewed {
                append_access_token_cookie(response.headers_mut(), &token);
            }
            response
        }
    }
}

fn with_path(uri: &Uri, path: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>()?);
    Ok(Uri::from_parts(parts)?)
}
