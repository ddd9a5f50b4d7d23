use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("missing configuration value: {0}")]
    MissingConfig(&'static str),
}

pub type SessionResult<T> = Result<T, SessionError>;
