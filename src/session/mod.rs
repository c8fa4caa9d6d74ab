//! The per-request gate: dispatch on the bound account's status and
//! decide pass-through versus redirect.
//!
//! Durable state lives in the stores; the session binding only carries
//! the volatile account object for one caller. Token validity is
//! re-checked against the store on every screened request.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::accounts::UserAccount;
use crate::auth::{Authenticator, LoginStatus};
use crate::error::Error;

/// What the caller's session must expose: one typed accessor for the
/// bound account, plus id rotation and invalidation.
pub trait SessionBinding {
    fn account(&self) -> Option<&UserAccount>;

    fn bind_account(&mut self, account: UserAccount);

    fn take_account(&mut self) -> Option<UserAccount>;

    fn session_id(&self) -> &str;

    /// Replace the session id and return the new one.
    fn rotate_id(&mut self) -> String;

    /// Discard the bound account and rotate the id.
    fn invalidate(&mut self);
}

/// In-process session for embedders and tests.
#[derive(Clone, Debug)]
pub struct MemorySession {
    id: String,
    account: Option<UserAccount>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account: None,
        }
    }
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBinding for MemorySession {
    fn account(&self) -> Option<&UserAccount> {
        self.account.as_ref()
    }

    fn bind_account(&mut self, account: UserAccount) {
        self.account = Some(account);
    }

    fn take_account(&mut self) -> Option<UserAccount> {
        self.account.take()
    }

    fn session_id(&self) -> &str {
        &self.id
    }

    fn rotate_id(&mut self) -> String {
        self.id = Uuid::new_v4().to_string();
        self.id.clone()
    }

    fn invalidate(&mut self) {
        self.account = None;
        self.id = Uuid::new_v4().to_string();
    }
}

/// Request targets. `PasswordChange` and `OlrSetup` are the narrowly
/// scoped follow-up endpoints that `Expired` and `OlrSetup` logons may
/// still reach.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Gate {
    Logon,
    PasswordChange,
    OlrSetup,
    Protected,
}

/// Where a screened request goes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    Proceed,
    RedirectToLogon,
    /// Session has been invalidated.
    RedirectToLogout,
    RedirectToPasswordChange,
    RedirectToOlrSetup,
}

pub struct SessionAuthority {
    authenticator: Arc<Authenticator>,
}

impl SessionAuthority {
    #[must_use]
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Bind a freshly authenticated account, rotating the session id
    /// first so a pre-authentication id cannot be replayed.
    pub fn establish<S: SessionBinding>(&self, session: &mut S, mut account: UserAccount) {
        let new_id = session.rotate_id();
        account.session_id = Some(new_id);
        session.bind_account(account);
    }

    /// Screen one request. Errors never surface: every failure maps to
    /// a redirect, unmapped kinds fail closed to logout.
    pub async fn screen<S: SessionBinding>(&self, session: &mut S, gate: Gate) -> Disposition {
        let Some(account) = session.account() else {
            return if gate == Gate::Logon {
                Disposition::Proceed
            } else {
                Disposition::RedirectToLogon
            };
        };

        let guid = account.guid;
        let username = account.username.clone();
        let token = account.auth_token.clone();

        match account.status {
            LoginStatus::Anonymous => {
                if gate == Gate::Logon {
                    Disposition::Proceed
                } else {
                    Disposition::RedirectToLogon
                }
            }
            // A failed attempt keeps its session for the retry at the
            // logon endpoint; everywhere else it goes back to logon.
            LoginStatus::Failure => {
                if gate == Gate::Logon {
                    Disposition::Proceed
                } else {
                    Disposition::RedirectToLogon
                }
            }
            LoginStatus::Lockout | LoginStatus::Suspended => {
                session.invalidate();
                Disposition::RedirectToLogout
            }
            LoginStatus::Success => {
                self.screen_authenticated(session, guid, &username, token, gate, None)
                    .await
            }
            LoginStatus::Expired => {
                self.screen_authenticated(
                    session,
                    guid,
                    &username,
                    token,
                    gate,
                    Some((Gate::PasswordChange, Disposition::RedirectToPasswordChange)),
                )
                .await
            }
            LoginStatus::OlrSetup => {
                self.screen_authenticated(
                    session,
                    guid,
                    &username,
                    token,
                    gate,
                    Some((Gate::OlrSetup, Disposition::RedirectToOlrSetup)),
                )
                .await
            }
        }
    }

    /// Token check shared by the authenticated states. `narrow`
    /// restricts the session to one follow-up gate.
    async fn screen_authenticated<S: SessionBinding>(
        &self,
        session: &mut S,
        guid: Uuid,
        username: &str,
        token: Option<String>,
        gate: Gate,
        narrow: Option<(Gate, Disposition)>,
    ) -> Disposition {
        let Some(token) = token else {
            session.invalidate();
            return Disposition::RedirectToLogout;
        };

        match self
            .authenticator
            .validate_auth_token(guid, username, &token)
            .await
        {
            Ok(true) => match narrow {
                None => Disposition::Proceed,
                Some((allowed, redirect)) => {
                    if gate == allowed {
                        Disposition::Proceed
                    } else {
                        redirect
                    }
                }
            },
            Ok(false) => {
                session.invalidate();
                Disposition::RedirectToLogout
            }
            Err(err) => {
                warn!("token validation for {username} errored: {err}");
                session.invalidate();
                disposition_for_error(&err)
            }
        }
    }
}

/// Map every error kind onto a redirect. The match is exhaustive so a
/// new kind cannot slip through unmapped; the catch-all behavior for
/// infrastructure faults is logoff-style denial.
#[must_use]
pub fn disposition_for_error(err: &Error) -> Disposition {
    match err {
        Error::AuthenticationFailure
        | Error::AccountNotFound { .. }
        | Error::ResetExpired
        | Error::ResetConsumed => Disposition::RedirectToLogon,
        Error::OlrNotConfigured => Disposition::RedirectToOlrSetup,
        Error::AccountLocked | Error::OlrLocked => Disposition::RedirectToLogout,
        Error::Crypto(_)
        | Error::Store(_)
        | Error::KeyManagement(_)
        | Error::DuplicateAccount { .. }
        | Error::AmbiguousAccount { .. } => Disposition::RedirectToLogout,
    }
}

#[cfg(test)]
mod tests {
    use super::{disposition_for_error, Disposition, MemorySession, SessionBinding};
    use crate::error::{CryptoError, Error, StoreError};
    use uuid::Uuid;

    #[test]
    fn memory_session_rotates_and_invalidates() {
        let mut session = MemorySession::new();
        let original = session.session_id().to_string();

        let rotated = session.rotate_id();
        assert_ne!(rotated, original);
        assert_eq!(session.session_id(), rotated);

        session.invalidate();
        assert_ne!(session.session_id(), rotated);
        assert!(session.account().is_none());
    }

    #[test]
    fn recoverable_errors_redirect_to_logon() {
        for err in [
            Error::AuthenticationFailure,
            Error::AccountNotFound {
                guid: Uuid::new_v4(),
            },
            Error::ResetExpired,
            Error::ResetConsumed,
        ] {
            assert_eq!(disposition_for_error(&err), Disposition::RedirectToLogon);
        }
    }

    #[test]
    fn infrastructure_errors_fail_closed() {
        let store = Error::Store(StoreError::AffectedRows {
            expected: 1,
            actual: 2,
        });
        let crypto = Error::Crypto(CryptoError::CipherFailure);
        let locked = Error::AccountLocked;

        for err in [store, crypto, locked] {
            assert_eq!(disposition_for_error(&err), Disposition::RedirectToLogout);
        }
    }

    #[test]
    fn olr_misconfiguration_routes_to_setup() {
        assert_eq!(
            disposition_for_error(&Error::OlrNotConfigured),
            Disposition::RedirectToOlrSetup
        );
    }
}
