//! Session token primitives for the back-office gate.
//!
//! # Purpose
//! Defines the access-token claims, the ADMIN role, and helpers to mint,
//! peek at, and verify HS256 session tokens.
//!
//! # How it fits
//! The external login flow mints access tokens with the shared secret; the
//! gate service verifies them (and freshly refreshed ones) on every protected
//! request using the types in this crate.
//!
//! # Key invariants
//! - Session tokens are HS256 only; any other algorithm is rejected.
//! - `iss` must equal the configured issuer and `exp` must be present.
//! - [`peek_claims`] never grants access; it only decides whether a refresh
//!   is attempted.
//!
//! # Examples
//! ```rust
//! use backoffice_session::{
//!     ADMIN_ROLE, SessionTokenIssuer, SessionTokenVerifier, SigningSecret, Verification,
//! };
//! use std::time::Duration;
//!
//! let secret = SigningSecret::new("example-secret");
//! let issuer = SessionTokenIssuer::new("backoffice", &secret, Duration::from_secs(60));
//! let token = issuer.mint(ADMIN_ROLE, None).unwrap();
//! let verifier = SessionTokenVerifier::new("backoffice", &secret, 0).unwrap();
//! assert!(matches!(verifier.verify(&token), Verification::Valid(c) if c.is_admin()));
//! ```

mod claims;
mod errors;
mod token;

pub use claims::{
    ADMIN_ROLE, SessionClaims, SigningSecret, UnverifiedClaims, now_epoch_seconds,
};
pub use errors::{SessionError, SessionResult};
pub use token::{
    InvalidReason, SessionTokenIssuer, SessionTokenVerifier, Verification, peek_claims,
};
