//! Session gate: per-request ADMIN session decision.
//!
//! # Purpose
//! Turns a request path and its cookies into a [`Verdict`]: forward, forward
//! with a renewed session cookie, or redirect.
//!
//! # Flow
//! 1. Classify the path ([`RouteMatcher`]). Public and unguarded paths are
//!    forwarded without looking at cookies.
//! 2. Read the `accessToken` cookie; absent means deny.
//! 3. Peek at `exp` without verifying the signature.
//! 4. Expired: one refresh call, then verify the new token.
//!    Fresh: verify the presented token.
//! 5. The verified role must be `ADMIN`.
//!
//! The home page runs the same check silently: an authenticated admin is
//! sent to the dashboard, anyone else sees the home page.
//!
//! # Key invariants
//! - Allow requires a token that verified against the configured secret and
//!   issuer, is unexpired, and carries the ADMIN role.
//! - At most one refresh call per request.
//! - Every failure collapses into the same redirect; the reason only reaches
//!   logs and metrics.
//! - No state is kept between requests.
use crate::config::{RouteConfig, SessionConfig};
use crate::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, read_cookie};
use crate::refresh::{RefreshClient, RefreshRequest, TokenRefresher};
use crate::routes::{PathClass, RouteMatcher};
use anyhow::Context;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use backoffice_session::{
    InvalidReason, SessionClaims, SessionTokenVerifier, Verification, now_epoch_seconds,
    peek_claims,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Forward,
    /// Forward and set a renewed `accessToken` cookie on the response.
    ForwardRenewed(String),
    Redirect {
        location: String,
        renewed: Option<String>,
    },
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Forward => "forward",
            Verdict::ForwardRenewed(_) => "forward_renewed",
            Verdict::Redirect { .. } => "redirect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    MalformedToken,
    InvalidToken(InvalidReason),
    RefreshFailed(&'static str),
    RefreshedTokenInvalid(InvalidReason),
    NotAdmin,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing_token",
            DenyReason::MalformedToken => "malformed_token",
            DenyReason::InvalidToken(_) => "invalid_token",
            DenyReason::RefreshFailed(_) => "refresh_failed",
            DenyReason::RefreshedTokenInvalid(_) => "refreshed_token_invalid",
            DenyReason::NotAdmin => "not_admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Allowed {
        claims: SessionClaims,
        renewed: Option<String>,
    },
    Denied(DenyReason),
}

#[derive(Clone)]
pub struct SessionGate {
    verifier: Arc<SessionTokenVerifier>,
    refresher: Arc<dyn TokenRefresher>,
    routes: Arc<RouteMatcher>,
}

impl SessionGate {
    pub fn new(
        verifier: SessionTokenVerifier,
        refresher: Arc<dyn TokenRefresher>,
        routes: RouteMatcher,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            refresher,
            routes: Arc::new(routes),
        }
    }

    pub fn from_config(session: &SessionConfig, routes: &RouteConfig) -> anyhow::Result<Self> {
        let verifier =
            SessionTokenVerifier::new(session.issuer.clone(), &session.secret, session.leeway_secs)
                .context("build session token verifier")?;
        let refresher = RefreshClient::new(session.refresh_url.clone(), session.refresh_timeout)
            .context("build refresh client")?;
        Ok(Self::new(
            verifier,
            Arc::new(refresher),
            RouteMatcher::new(routes),
        ))
    }

    pub fn routes(&self) -> &RouteMatcher {
        &self.routes
    }

    pub async fn evaluate(&self, path: &str, headers: &HeaderMap) -> Verdict {
        let class = self.routes.classify(path);
        let verdict = match class {
            PathClass::Public | PathClass::Unguarded => Verdict::Forward,
            PathClass::Home => match self.authenticate(headers).await {
                SessionOutcome::Allowed { renewed, .. } => Verdict::Redirect {
                    location: self.routes.dashboard_path().to_string(),
                    renewed,
                },
                SessionOutcome::Denied(reason) => {
                    tracing::debug!(path, reason = reason.as_str(), "home page without session");
                    Verdict::Forward
                }
            },
            PathClass::Protected => match self.authenticate(headers).await {
                SessionOutcome::Allowed {
                    renewed: Some(token),
                    ..
                } => Verdict::ForwardRenewed(token),
                SessionOutcome::Allowed { renewed: None, .. } => Verdict::Forward,
                SessionOutcome::Denied(reason) => {
                    tracing::debug!(
                        path,
                        reason = reason.as_str(),
                        detail = ?reason,
                        "session denied"
                    );
                    metrics::counter!("backoffice_gate_denied_total", "reason" => reason.as_str())
                        .increment(1);
                    Verdict::Redirect {
                        location: self.routes.home_path().to_string(),
                        renewed: None,
                    }
                }
            },
        };
        metrics::counter!(
            "backoffice_gate_verdicts_total",
            "class" => class.as_str(),
            "verdict" => verdict.as_str()
        )
        .increment(1);
        verdict
    }

    /// Decide whether the request carries a valid ADMIN session.
    pub async fn authenticate(&self, headers: &HeaderMap) -> SessionOutcome {
        let Some(token) = read_cookie(headers, ACCESS_TOKEN_COOKIE) else {
            return SessionOutcome::Denied(DenyReason::MissingToken);
        };
        let unverified = match peek_claims(&token) {
            Ok(claims) => claims,
            Err(_) => return SessionOutcome::Denied(DenyReason::MalformedToken),
        };

        if !unverified.is_expired_at(now_epoch_seconds()) {
            return match self.verifier.verify(&token) {
                Verification::Valid(claims) => role_check(claims, None),
                Verification::Invalid(reason) => {
                    SessionOutcome::Denied(DenyReason::InvalidToken(reason))
                }
            };
        }

        let cookie_header = joined_cookie_header(headers);
        let refresh_token = read_cookie(headers, REFRESH_TOKEN_COOKIE);
        let request = RefreshRequest {
            cookie_header: cookie_header.as_deref(),
            refresh_token: refresh_token.as_deref(),
        };
        let renewed = match self.refresher.refresh(request).await {
            Ok(token) => {
                metrics::counter!("backoffice_gate_refresh_total", "outcome" => "ok").increment(1);
                token
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh failed");
                metrics::counter!("backoffice_gate_refresh_total", "outcome" => err.as_str())
                    .increment(1);
                return SessionOutcome::Denied(DenyReason::RefreshFailed(err.as_str()));
            }
        };
        match self.verifier.verify(&renewed) {
            Verification::Valid(claims) => role_check(claims, Some(renewed)),
            Verification::Invalid(reason) => {
                SessionOutcome::Denied(DenyReason::RefreshedTokenInvalid(reason))
            }
        }
    }
}

fn role_check(claims: SessionClaims, renewed: Option<String>) -> SessionOutcome {
    if claims.is_admin() {
        SessionOutcome::Allowed { claims, renewed }
    } else {
        SessionOutcome::Denied(DenyReason::NotAdmin)
    }
}

// HTTP/2 clients may split cookies across several headers.
fn joined_cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}
