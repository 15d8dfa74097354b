//! Session token lifecycle for the realtime client.
//!
//! | module    | role                                               |
//! |-----------|----------------------------------------------------|
//! | `machine` | tick-driven authenticate/refresh/retry state machine |
//! | `token`   | JWT `exp` claim extraction                          |
//!
//! The machine is deliberately runtime-agnostic: it is polled with an
//! explicit clock and talks to the outside world only through the
//! [`AuthProvider`] trait, so owners embed it in whatever scheduling they
//! already have.

pub mod error;
pub mod machine;
pub mod token;

pub use error::AuthError;
pub use machine::{
    AuthProvider, AuthResponse, AuthSession, AuthStatus, AuthTarget, Credentials,
    REFRESH_MARGIN, REFRESH_POLL_INTERVAL, RETRY_BACKOFF_MAX, RETRY_BACKOFF_START,
};
pub use token::jwt_expiry;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, AuthError>;
