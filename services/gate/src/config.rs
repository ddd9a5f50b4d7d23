use anyhow::{Context, Result, anyhow};
use backoffice_session::SigningSecret;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_HOME_PATH: &str = "/";
pub const DEFAULT_DASHBOARD_PATH: &str = "/dashboard";

// Gate service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    // Back-office application that allowed requests are proxied to.
    pub upstream_url: String,
    pub session: SessionConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: SigningSecret,
    pub issuer: String,
    pub refresh_url: String,
    pub refresh_timeout: Duration,
    // Clock leeway applied when the signature-verified `exp` is checked.
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub home_path: String,
    pub dashboard_path: String,
    pub protected_prefixes: Vec<String>,
    pub public_prefixes: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            home_path: DEFAULT_HOME_PATH.to_string(),
            dashboard_path: DEFAULT_DASHBOARD_PATH.to_string(),
            protected_prefixes: vec![
                "/admin".to_string(),
                "/dashboard".to_string(),
                "/settings".to_string(),
            ],
            public_prefixes: vec![
                "/_next".to_string(),
                "/favicon.ico".to_string(),
                "/api/auth".to_string(),
                "/api/health".to_string(),
            ],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GateConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    upstream_url: Option<String>,
    issuer: Option<String>,
    refresh_url: Option<String>,
    refresh_timeout_ms: Option<u64>,
    protected_prefixes: Option<Vec<String>>,
    public_prefixes: Option<Vec<String>>,
}

// Values gathered from env and the optional YAML file before the required
// ones are checked.
#[derive(Debug)]
struct PartialConfig {
    bind_addr: SocketAddr,
    metrics_bind: SocketAddr,
    upstream_url: String,
    secret: Option<SigningSecret>,
    issuer: Option<String>,
    refresh_url: Option<String>,
    refresh_timeout_ms: u64,
    leeway_secs: u64,
    routes: RouteConfig,
}

impl GateConfig {
    pub fn from_env() -> Result<Self> {
        PartialConfig::from_env()?.finish()
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut partial = PartialConfig::from_env()?;
        if let Ok(path) = std::env::var("BACKOFFICE_GATE_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read BACKOFFICE_GATE_CONFIG: {path}"))?;
            let override_cfg: GateConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse gate config yaml")?;
            partial.apply(override_cfg)?;
        }
        partial.finish()
    }
}

impl PartialConfig {
    fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("BACKOFFICE_GATE_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse BACKOFFICE_GATE_BIND")?;
        let metrics_bind = std::env::var("BACKOFFICE_GATE_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse BACKOFFICE_GATE_METRICS_BIND")?;
        let upstream_url = std::env::var("BACKOFFICE_UPSTREAM_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let refresh_timeout_ms = std::env::var("BACKOFFICE_REFRESH_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_REFRESH_TIMEOUT_MS);
        let leeway_secs = std::env::var("BACKOFFICE_JWT_LEEWAY_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(Self {
            bind_addr,
            metrics_bind,
            upstream_url,
            secret: secret_from_env()?,
            issuer: non_empty_env("BACKOFFICE_JWT_ISSUER"),
            refresh_url: non_empty_env("BACKOFFICE_REFRESH_URL"),
            refresh_timeout_ms,
            leeway_secs,
            routes: RouteConfig::default(),
        })
    }

    fn apply(&mut self, override_cfg: GateConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.upstream_url {
            self.upstream_url = value;
        }
        if let Some(value) = override_cfg.issuer.filter(|v| !v.trim().is_empty()) {
            self.issuer = Some(value);
        }
        if let Some(value) = override_cfg.refresh_url.filter(|v| !v.trim().is_empty()) {
            self.refresh_url = Some(value);
        }
        if let Some(value) = override_cfg.refresh_timeout_ms.filter(|v| *v > 0) {
            self.refresh_timeout_ms = value;
        }
        if let Some(value) = override_cfg.protected_prefixes {
            self.routes.protected_prefixes = value;
        }
        if let Some(value) = override_cfg.public_prefixes {
            self.routes.public_prefixes = value;
        }
        Ok(())
    }

    fn finish(self) -> Result<GateConfig> {
        let secret = self.secret.ok_or_else(|| {
            anyhow!("missing required configuration: BACKOFFICE_JWT_SECRET or BACKOFFICE_JWT_SECRET_FILE")
        })?;
        let issuer = self
            .issuer
            .ok_or_else(|| anyhow!("missing required configuration: BACKOFFICE_JWT_ISSUER"))?;
        let refresh_url = self
            .refresh_url
            .ok_or_else(|| anyhow!("missing required configuration: BACKOFFICE_REFRESH_URL"))?;
        Ok(GateConfig {
            bind_addr: self.bind_addr,
            metrics_bind: self.metrics_bind,
            upstream_url: self.upstream_url,
            session: SessionConfig {
                secret,
                issuer,
                refresh_url,
                refresh_timeout: Duration::from_millis(self.refresh_timeout_ms),
                leeway_secs: self.leeway_secs,
            },
            routes: self.routes,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

// Inline secret takes precedence over the secret file.
fn secret_from_env() -> Result<Option<SigningSecret>> {
    if let Some(value) = non_empty_env("BACKOFFICE_JWT_SECRET") {
        return Ok(Some(SigningSecret::new(value)));
    }
    let Some(path) = non_empty_env("BACKOFFICE_JWT_SECRET_FILE") else {
        return Ok(None);
    };
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("read BACKOFFICE_JWT_SECRET_FILE: {path}"))?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(SigningSecret::new(trimmed)))
}
