use crate::claims::{SessionClaims, SigningSecret, UnverifiedClaims, now_epoch_seconds};
use crate::{SessionError, SessionResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::Duration;

const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token was rejected. Kept server-side for logs and metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    Algorithm,
    Signature,
    Issuer,
    Expired,
    Claims,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed",
            InvalidReason::Algorithm => "algorithm",
            InvalidReason::Signature => "signature",
            InvalidReason::Issuer => "issuer",
            InvalidReason::Expired => "expired",
            InvalidReason::Claims => "claims",
        }
    }
}

impl From<&jsonwebtoken::errors::Error> for InvalidReason {
    fn from(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => InvalidReason::Signature,
            ErrorKind::InvalidIssuer => InvalidReason::Issuer,
            ErrorKind::ExpiredSignature => InvalidReason::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                InvalidReason::Algorithm
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => InvalidReason::Malformed,
            _ => InvalidReason::Claims,
        }
    }
}

/// Outcome of a signature + issuer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(SessionClaims),
    Invalid(InvalidReason),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

/// Read the payload of a compact JWT without checking its signature.
///
/// Used only to look at `exp` before deciding between verification and
/// refresh.
pub fn peek_claims(token: &str) -> SessionResult<UnverifiedClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::MalformedToken("token format".to_string()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| SessionError::MalformedToken("token payload".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| SessionError::MalformedToken(format!("token payload: {err}")))
}

#[derive(Clone)]
pub struct SessionTokenVerifier {
    issuer: String,
    leeway: u64,
    decoding_key: DecodingKey,
}

impl SessionTokenVerifier {
    pub fn new(
        issuer: impl Into<String>,
        secret: &SigningSecret,
        leeway: u64,
    ) -> SessionResult<Self> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(SessionError::MissingConfig("issuer"));
        }
        if secret.is_empty() {
            return Err(SessionError::MissingConfig("signing secret"));
        }
        Ok(Self {
            issuer,
            leeway,
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn verify(&self, token: &str) -> Verification {
        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;
        validation.leeway = self.leeway;
        match jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Verification::Valid(data.claims),
            Err(err) => Verification::Invalid(InvalidReason::from(&err)),
        }
    }
}

/// Mints access tokens the way the login flow does.
pub struct SessionTokenIssuer {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
}

impl SessionTokenIssuer {
    pub fn new(issuer: impl Into<String>, secret: &SigningSecret, ttl: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            ttl,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn mint(&self, role: &str, subject: Option<&str>) -> SessionResult<String> {
        let now = now_epoch_seconds();
        self.mint_expiring_at(role, subject, now + self.ttl.as_secs() as i64)
    }

    pub fn mint_expiring_at(
        &self,
        role: &str,
        subject: Option<&str>,
        exp: i64,
    ) -> SessionResult<String> {
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            role: role.to_string(),
            exp,
            sub: subject.map(str::to_string),
            iat: Some(now_epoch_seconds()),
        };
        let token = jsonwebtoken::encode(
            &Header::new(SESSION_ALGORITHM),
            &claims,
            &self.encoding_key,
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ADMIN_ROLE;

    const ISSUER: &str = "backoffice-auth";

    fn secret() -> SigningSecret {
        SigningSecret::new("test-signing-secret-0123456789")
    }

    fn issuer() -> SessionTokenIssuer {
        SessionTokenIssuer::new(ISSUER, &secret(), Duration::from_secs(600))
    }

    fn verifier() -> SessionTokenVerifier {
        SessionTokenVerifier::new(ISSUER, &secret(), 0).expect("verifier")
    }

    #[test]
    fn mint_and_verify_admin_token() {
        let token = issuer().mint(ADMIN_ROLE, Some("user-1")).expect("mint");
        match verifier().verify(&token) {
            Verification::Valid(claims) => {
                assert!(claims.is_admin());
                assert_eq!(claims.iss, ISSUER);
                assert_eq!(claims.sub.as_deref(), Some("user-1"));
            }
            other => panic!("unexpected verification: {other:?}"),
        }
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let other = SessionTokenIssuer::new("someone-else", &secret(), Duration::from_secs(600));
        let token = other.mint(ADMIN_ROLE, None).expect("mint");
        assert_eq!(
            verifier().verify(&token),
            Verification::Invalid(InvalidReason::Issuer)
        );
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let forged = SessionTokenIssuer::new(
            ISSUER,
            &SigningSecret::new("another-secret"),
            Duration::from_secs(600),
        );
        let token = forged.mint(ADMIN_ROLE, None).expect("mint");
        assert_eq!(
            verifier().verify(&token),
            Verification::Invalid(InvalidReason::Signature)
        );
    }

    #[test]
    fn verify_rejects_expired_token() {
        let token = issuer()
            .mint_expiring_at(ADMIN_ROLE, None, now_epoch_seconds() - 120)
            .expect("mint");
        assert_eq!(
            verifier().verify(&token),
            Verification::Invalid(InvalidReason::Expired)
        );
    }

    #[test]
    fn verify_rejects_garbage() {
        assert_eq!(
            verifier().verify("not-a-jwt"),
            Verification::Invalid(InvalidReason::Malformed)
        );
    }

    #[test]
    fn verify_rejects_other_algorithms() {
        let claims = SessionClaims {
            iss: ISSUER.to_string(),
            role: ADMIN_ROLE.to_string(),
            exp: now_epoch_seconds() + 600,
            sub: None,
            iat: None,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret().as_bytes()),
        )
        .expect("encode");
        assert_eq!(
            verifier().verify(&token),
            Verification::Invalid(InvalidReason::Algorithm)
        );
    }

    #[test]
    fn verifier_requires_issuer_and_secret() {
        let err = SessionTokenVerifier::new("  ", &secret(), 0)
            .err()
            .expect("missing issuer");
        assert!(matches!(err, SessionError::MissingConfig("issuer")));

        let err = SessionTokenVerifier::new(ISSUER, &SigningSecret::new(""), 0)
            .err()
            .expect("missing secret");
        assert!(matches!(err, SessionError::MissingConfig("signing secret")));
    }

    #[test]
    fn peek_reads_expiry_without_signature() {
        let forged = SessionTokenIssuer::new(
            "anyone",
            &SigningSecret::new("whatever"),
            Duration::from_secs(600),
        );
        let token = forged
            .mint_expiring_at(ADMIN_ROLE, None, 1_700_000_000)
            .expect("mint");
        let claims = peek_claims(&token).expect("peek");
        assert_eq!(claims.exp, Some(1_700_000_000));
    }

    #[test]
    fn peek_rejects_malformed_tokens() {
        for token in ["", "abc", "a.b", "a.b.c.d", "a.!!!.c"] {
            let err = peek_claims(token).expect_err("malformed");
            assert!(matches!(err, SessionError::MalformedToken(_)), "{token}");
        }
        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(peek_claims(&not_json).is_err());
    }

    #[test]
    fn invalid_reason_labels_are_stable() {
        assert_eq!(InvalidReason::Issuer.as_str(), "issuer");
        assert_eq!(InvalidReason::Signature.as_str(), "signature");
    }
}
