#![allow(dead_code)]

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use backoffice_session::{SessionTokenIssuer, SigningSecret, now_epoch_seconds};
use gate::config::{RouteConfig, SessionConfig};
use gate::gate::SessionGate;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_ISSUER: &str = "backoffice-test";
pub const TEST_SECRET: &str = "integration-secret";
pub const REFRESH_PATH: &str = "/api/auth/refresh";

pub fn issuer() -> SessionTokenIssuer {
    SessionTokenIssuer::new(
        TEST_ISSUER,
        &SigningSecret::new(TEST_SECRET),
        Duration::from_secs(900),
    )
}

pub fn fresh_token(role: &str) -> String {
    issuer().mint(role, Some("user-1")).expect("mint")
}

pub fn expired_token(role: &str) -> String {
    issuer()
        .mint_expiring_at(role, Some("user-1"), now_epoch_seconds() - 60)
        .expect("mint expired")
}

pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    addr
}

pub async fn read_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[derive(Clone)]
pub enum RefreshReply {
    Token(String),
    Status(StatusCode),
}

/// Local stand-in for the authentication service's refresh endpoint.
pub struct MockRefreshServer {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

struct MockState {
    reply: RefreshReply,
    calls: AtomicUsize,
    last_cookie: Mutex<Option<String>>,
    last_body: Mutex<Option<serde_json::Value>>,
}

impl MockRefreshServer {
    pub async fn start(reply: RefreshReply) -> Self {
        let state = Arc::new(MockState {
            reply,
            calls: AtomicUsize::new(0),
            last_cookie: Mutex::new(None),
            last_body: Mutex::new(None),
        });
        let router = Router::new()
            .route(REFRESH_PATH, post(refresh_handler))
            .with_state(state.clone());
        let addr = spawn(router).await;
        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, REFRESH_PATH)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last_cookie(&self) -> Option<String> {
        self.state.last_cookie.lock().expect("lock").clone()
    }

    pub fn last_body(&self) -> Option<serde_json::Value> {
        self.state.last_body.lock().expect("lock").clone()
    }

    pub fn gate(&self) -> SessionGate {
        let session = SessionConfig {
            secret: SigningSecret::new(TEST_SECRET),
            issuer: TEST_ISSUER.to_string(),
            refresh_url: self.url(),
            refresh_timeout: Duration::from_secs(2),
            leeway_secs: 0,
        };
        SessionGate::from_config(&session, &RouteConfig::default()).expect("gate")
    }
}

async fn refresh_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_cookie.lock().expect("lock") = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    *state.last_body.lock().expect("lock") = Some(body);
    match &state.reply {
        RefreshReply::Token(token) => {
            Json(serde_json::json!({ "accessToken": token })).into_response()
        }
        RefreshReply::Status(status) => (*status).into_response(),
    }
}
