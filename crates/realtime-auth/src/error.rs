//! Error types for authentication.

use thiserror::Error;

/// Errors from a credential fetch. None of these are fatal to the session:
/// every failure schedules a retry with exponential backoff.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The external token provider failed.
    #[error("auth provider: {0}")]
    Provider(String),

    /// The token is not a three-part JWT.
    #[error("token is not a three-part JWT")]
    MalformedToken,

    /// The token payload did not decode to JSON.
    #[error("token payload is not valid JSON")]
    TokenPayload,

    /// The token payload has no numeric `exp` claim.
    #[error("token payload has no usable 'exp' claim")]
    MissingExpiry,
}
