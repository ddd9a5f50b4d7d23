//! Gate HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router: the gate's own health endpoint, the upstream proxy
//! fallback, the session gate middleware, and request tracing.
//!
//! # Notes
//! [`with_session_gate`] wraps any router, so the gate can also sit in front
//! of in-process handlers instead of the proxy.
use crate::gate::SessionGate;
use crate::middleware::session_gate;
use crate::observability;
use crate::proxy::{UpstreamProxy, proxy_handler};
use axum::Json;
use axum::Router;
use axum::extract::FromRef;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const GATE_HEALTH_PATH: &str = "/_gate/health";

#[derive(Clone)]
pub struct AppState {
    pub gate: SessionGate,
    pub proxy: UpstreamProxy,
}

impl FromRef<AppState> for SessionGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl FromRef<AppState> for UpstreamProxy {
    fn from_ref(state: &AppState) -> Self {
        state.proxy.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route(GATE_HEALTH_PATH, axum::routing::get(gate_health))
        .fallback(proxy_handler)
        .with_state(state.clone());
    with_tracing(with_session_gate(router, state.gate))
}

/// Put the session gate in front of every route of `router`, fallback
/// included.
pub fn with_session_gate(router: Router, gate: SessionGate) -> Router {
    router.layer(axum::middleware::from_fn_with_state(gate, session_gate))
}

fn with_tracing(router: Router) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });
    router.layer(trace_layer)
}

async fn gate_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}
