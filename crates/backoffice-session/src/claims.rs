use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Role value granting access to the back-office.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Claims carried by a back-office access token.
///
/// `iss`, `role` and `exp` are mandatory; the login flow may add a subject
/// and issue time which the gate ignores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub role: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl SessionClaims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Claims read from a token payload before any signature check.
///
/// Only the expiry is consulted, and only to decide whether a refresh is
/// needed. Nothing here may grant access.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedClaims {
    #[serde(default)]
    pub exp: Option<i64>,
}

impl UnverifiedClaims {
    /// A token without `exp` is treated as expired so that it goes through
    /// the refresh path instead of being trusted indefinitely.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.exp {
            Some(exp) => exp <= now,
            None => true,
        }
    }
}

/// HMAC secret shared with the login flow.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
