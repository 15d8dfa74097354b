//! The authentication session state machine.
//!
//! A session cycles `Authenticating → Authenticated → Error` per target
//! identity (document and/or group). The machine is tick-driven: it never
//! sleeps or spawns; the owner calls [`AuthSession::poll`] on its own
//! schedule ([`AuthSession::next_poll_in`] says how long it may wait) and
//! the machine decides whether the moment calls for a credential fetch.
//!
//! - a failed fetch backs off exponentially: 1 s, 2 s, 4 s, 8 s, then 8 s
//!   flat until one succeeds;
//! - valid credentials are refreshed proactively once less than 150 s of
//!   validity remain, checked on a 5 s cadence;
//! - changing the target identity discards credentials and backoff and
//!   starts over.

use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::token::jwt_expiry;
use crate::Result;

/// First retry delay after a failed fetch.
pub const RETRY_BACKOFF_START: Duration = Duration::from_millis(1000);
/// Retry delay ceiling.
pub const RETRY_BACKOFF_MAX: Duration = Duration::from_millis(8000);
/// How often valid credentials are re-checked for looming expiry.
pub const REFRESH_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Remaining validity below which a refresh is triggered.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(150);

/// Where the session stands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum AuthStatus {
    Authenticating,
    Authenticated,
    Error,
}

/// The identity a session authenticates for. A session with neither field
/// set has nothing to authenticate and idles in `Authenticating`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuthTarget {
    pub document_id: Option<String>,
    pub group_id: Option<String>,
}

impl AuthTarget {
    /// Target a single document.
    pub fn document(id: impl Into<String>) -> Self {
        Self {
            document_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Target a document group.
    pub fn group(id: impl Into<String>) -> Self {
        Self {
            group_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Whether there is anything to authenticate.
    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.group_id.is_none()
    }

    /// Whether credentials issued for `issued` still cover this target:
    /// either the document or the group must carry over.
    fn shares_identity(&self, issued: &AuthTarget) -> bool {
        (self.document_id.is_some() && self.document_id == issued.document_id)
            || (self.group_id.is_some() && self.group_id == issued.group_id)
    }
}

/// What the external provider returns for a successful fetch.
#[derive(Clone, Debug)]
pub struct AuthResponse {
    pub socket_url: String,
    pub token: String,
    pub project_id: String,
}

/// External collaborator that exchanges an identity for a signed credential.
pub trait AuthProvider {
    fn authenticate(&mut self, target: &AuthTarget) -> Result<AuthResponse>;
}

/// A successfully fetched credential and the identity it was issued for.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub socket_url: String,
    pub token: String,
    pub project_id: String,
    pub expires_at: SystemTime,
    issued_for: AuthTarget,
}

/// Tick-driven authentication session for one (mutable) target identity.
#[derive(Debug)]
pub struct AuthSession {
    status: AuthStatus,
    target: AuthTarget,
    credentials: Option<Credentials>,
    backoff: Duration,
    next_attempt_at: Option<SystemTime>,
}

impl AuthSession {
    pub fn new(target: AuthTarget) -> Self {
        Self {
            status: AuthStatus::Authenticating,
            target,
            credentials: None,
            backoff: Duration::ZERO,
            next_attempt_at: None,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn target(&self) -> &AuthTarget {
        &self.target
    }

    /// Current credentials, if the session holds any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// The delay currently applied between failed fetches.
    pub fn retry_backoff(&self) -> Duration {
        self.backoff
    }

    /// Switch the session to a new identity. Credentials that still cover
    /// the new target are kept; otherwise the session starts over with a
    /// fresh backoff.
    pub fn set_target(&mut self, target: AuthTarget) {
        if target == self.target {
            return;
        }
        let covered = self
            .credentials
            .as_ref()
            .is_some_and(|credentials| target.shares_identity(&credentials.issued_for));
        self.target = target;
        if !covered {
            self.reset();
        }
    }

    /// How long the owner may wait before the next [`poll`](Self::poll).
    pub fn next_poll_in(&self, now: SystemTime) -> Duration {
        match self.status {
            AuthStatus::Authenticating => Duration::ZERO,
            AuthStatus::Authenticated => REFRESH_POLL_INTERVAL,
            AuthStatus::Error => self
                .next_attempt_at
                .and_then(|at| at.duration_since(now).ok())
                .unwrap_or(Duration::ZERO),
        }
    }

    /// Advance the machine. Fetches a credential when one is due; otherwise
    /// just re-evaluates expiry. Returns the status after the tick.
    pub fn poll(&mut self, provider: &mut impl AuthProvider, now: SystemTime) -> AuthStatus {
        if self.target.is_empty() {
            self.reset();
            return self.status;
        }

        match self.status {
            AuthStatus::Authenticating => self.attempt(provider, now),
            AuthStatus::Error => {
                let due = self.next_attempt_at.is_none_or(|at| now >= at);
                if due {
                    self.status = AuthStatus::Authenticating;
                    self.attempt(provider, now);
                }
            }
            AuthStatus::Authenticated => {
                let expiring = self.credentials.as_ref().is_none_or(|credentials| {
                    credentials
                        .expires_at
                        .duration_since(now)
                        .unwrap_or(Duration::ZERO)
                        < REFRESH_MARGIN
                });
                if expiring {
                    debug!(status = %AuthStatus::Authenticating, "credential expiring, refreshing");
                    self.status = AuthStatus::Authenticating;
                    self.attempt(provider, now);
                }
            }
        }
        self.status
    }

    fn reset(&mut self) {
        self.status = AuthStatus::Authenticating;
        self.credentials = None;
        self.backoff = Duration::ZERO;
        self.next_attempt_at = None;
    }

    fn attempt(&mut self, provider: &mut impl AuthProvider, now: SystemTime) {
        let fetched = provider
            .authenticate(&self.target)
            .and_then(|response| Ok((jwt_expiry(&response.token)?, response)));
        match fetched {
            Ok((expires_at, response)) => {
                self.credentials = Some(Credentials {
                    socket_url: response.socket_url,
                    token: response.token,
                    project_id: response.project_id,
                    expires_at,
                    issued_for: self.target.clone(),
                });
                self.status = AuthStatus::Authenticated;
                self.backoff = Duration::ZERO;
                self.next_attempt_at = None;
                debug!(status = %self.status, "authenticated");
            }
            Err(error) => {
                self.status = AuthStatus::Error;
                self.backoff = if self.backoff < RETRY_BACKOFF_START {
                    RETRY_BACKOFF_START
                } else {
                    (self.backoff * 2).min(RETRY_BACKOFF_MAX)
                };
                self.next_attempt_at = Some(now + self.backoff);
                warn!(%error, backoff_ms = self.backoff.as_millis() as u64, "authentication failed");
            }
        }
    }
}
