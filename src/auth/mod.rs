//! Logon, token validation, security questions, and the online-reset
//! flow.
//!
//! Hashing happens strictly upstream: callers derive password and
//! answer hashes with [`crate::crypto::hash_secret`] before calling in,
//! so plaintext never reaches this type. Nothing is cached between
//! calls; every validation re-reads the store, which keeps revoked
//! credentials dead on the next request.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::{AccountManager, UserAccount};
use crate::credentials::{CredentialStore, SaltKind, SecurityQa, StoredPassword};
use crate::crypto;
use crate::error::{Error, Result};
use crate::policy::SecurityPolicy;

/// Outcomes of the login state machine. `Success`, `OlrSetup`, and
/// `Expired` are the only states that permit continued processing; the
/// latter two only toward their follow-up endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    #[default]
    Anonymous,
    Success,
    Failure,
    Lockout,
    OlrSetup,
    Suspended,
    Expired,
}

/// A caller's answer to one security question, hashed upstream.
#[derive(Clone, Debug)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer_hash: String,
}

/// Online-reset view for one account.
#[derive(Clone, Copy, Debug)]
pub struct OlrStatus {
    pub configured: bool,
    pub locked: bool,
}

pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    accounts: AccountManager,
    policy: SecurityPolicy,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        accounts: AccountManager,
        policy: SecurityPolicy,
    ) -> Self {
        Self {
            credentials,
            accounts,
            policy,
        }
    }

    /// Compare the supplied hash byte-for-byte against the stored one
    /// and apply lockout bookkeeping. The returned account carries the
    /// resulting [`LoginStatus`] and, on a permitted logon, a fresh
    /// auth token.
    ///
    /// # Errors
    /// Store and crypto failures propagate; a wrong hash is a
    /// `Failure`/`Lockout` status, not an error.
    pub async fn perform_logon(
        &self,
        guid: Uuid,
        username: &str,
        supplied_hash: &str,
    ) -> Result<UserAccount> {
        let mut account = self.accounts.load(guid).await?;
        if account.username != username {
            return Err(Error::AuthenticationFailure);
        }

        if account.suspended {
            account.status = LoginStatus::Suspended;
            return Ok(account);
        }

        // The lock is sticky: even a correct hash cannot pass until an
        // explicit administrative unlock.
        if account.is_locked(self.policy.max_attempts()) {
            account.status = LoginStatus::Lockout;
            return Ok(account);
        }

        let stored = self.credentials.password_hash(guid, username).await?;
        if stored.hash != supplied_hash {
            let failed = account.failed_count + 1;
            let lock_now = failed >= self.policy.max_attempts();
            self.accounts.set_lock(guid, lock_now, 1).await?;
            warn!("logon failure {failed}/{} for {username}", self.policy.max_attempts());

            account.failed_count = failed;
            account.locked = lock_now;
            account.status = if lock_now {
                LoginStatus::Lockout
            } else {
                LoginStatus::Failure
            };
            return Ok(account);
        }

        self.accounts.set_lock(guid, false, 0).await?;
        self.accounts.record_login(guid).await?;
        account.failed_count = 0;
        account.locked = false;
        account.last_login = Some(Utc::now());
        account.auth_token = Some(self.issue_token(guid).await?);

        account.status = if self.password_expired(&stored) {
            LoginStatus::Expired
        } else if !account.olr_setup {
            LoginStatus::OlrSetup
        } else {
            info!("logon success for {username}");
            LoginStatus::Success
        };
        Ok(account)
    }

    /// Re-derive the expected token from the current token salt and
    /// compare. The salt is fetched fresh on every call, so this stays
    /// correct across administrative revocation and costs one read.
    pub async fn validate_auth_token(
        &self,
        guid: Uuid,
        username: &str,
        presented: &str,
    ) -> Result<bool> {
        let salt = self.credentials.salt(guid, SaltKind::Token).await?;
        let expected = crypto::hash_secret(
            &guid.to_string(),
            &salt,
            self.policy.iterations(),
            self.policy.key_length(),
            self.policy.digest_algorithm(),
        )?;
        let valid = expected == presented;
        if !valid {
            warn!("auth token mismatch for {username}");
        }
        Ok(valid)
    }

    /// Both stored answers must match, keyed by question text; a
    /// partial match is a failure.
    pub async fn verify_security_data(
        &self,
        guid: Uuid,
        username: &str,
        answers: &[AnsweredQuestion],
    ) -> Result<bool> {
        let qa = self.credentials.user_security_qa(guid, username).await?;

        let answer_for = |question: &str| {
            answers
                .iter()
                .find(|answer| answer.question == question)
                .map(|answer| answer.answer_hash.as_str())
        };

        let first = answer_for(&qa.question_one) == Some(qa.answer_hash_one.as_str());
        let second = answer_for(&qa.question_two) == Some(qa.answer_hash_two.as_str());
        Ok(first && second)
    }

    pub async fn olr_status(&self, guid: Uuid, username: &str) -> Result<OlrStatus> {
        let account = self.accounts.load(guid).await?;
        if account.username != username {
            return Err(Error::AuthenticationFailure);
        }
        Ok(OlrStatus {
            configured: account.olr_setup,
            locked: account.olr_locked,
        })
    }

    /// Store the question set and mark OLR as configured for the
    /// account, the follow-up step a fresh `OlrSetup` logon leads to.
    pub async fn configure_olr(&self, guid: Uuid, _username: &str, qa: &SecurityQa) -> Result<()> {
        self.credentials.store_security_qa(guid, qa).await?;
        self.accounts.mark_olr_configured(guid).await?;
        Ok(())
    }

    /// Invalidate server-side token bookkeeping. Rotating the salt
    /// kills every outstanding token derived from the old one.
    pub async fn perform_logoff(
        &self,
        guid: Uuid,
        username: &str,
        _auth_token: &str,
    ) -> Result<()> {
        self.rotate_token_salt(guid).await?;
        info!("logoff for {username}");
        Ok(())
    }

    /// Open an online reset: one fixed-length single-use id per
    /// account, replacing any prior active request.
    ///
    /// # Errors
    /// `Error::OlrLocked` when reset is administratively locked;
    /// `Error::OlrNotConfigured` when no questions are on file.
    pub async fn open_reset(&self, guid: Uuid, username: &str) -> Result<String> {
        let account = self.accounts.load(guid).await?;
        if account.username != username {
            return Err(Error::AuthenticationFailure);
        }
        if account.olr_locked {
            return Err(Error::OlrLocked);
        }
        if !account.olr_setup {
            return Err(Error::OlrNotConfigured);
        }

        let reset_id = crypto::random_alphanumeric(self.policy.reset_id_length());
        self.credentials
            .insert_reset_request(guid, &reset_id)
            .await?;
        Ok(reset_id)
    }

    /// Claim a reset id exactly once and enforce its TTL.
    ///
    /// # Errors
    /// `Error::ResetConsumed` for unknown or already-claimed ids;
    /// `Error::ResetExpired` past the policy timeout, even when the
    /// request was never consumed.
    pub async fn redeem_reset(&self, reset_id: &str) -> Result<Uuid> {
        let Some(claim) = self.credentials.consume_reset_request(reset_id).await? else {
            return Err(Error::ResetConsumed);
        };

        let ttl = Duration::minutes(self.policy.reset_timeout_minutes());
        if claim.created_at + ttl <= Utc::now() {
            warn!("expired reset request for {}", claim.guid);
            return Err(Error::ResetExpired);
        }
        Ok(claim.guid)
    }

    /// Store a new salt and password hash, both derived upstream.
    pub async fn change_password(
        &self,
        guid: Uuid,
        username: &str,
        new_hash: &str,
        new_salt: &str,
        is_reset: bool,
    ) -> Result<()> {
        self.credentials
            .store_salt(guid, SaltKind::Password, new_salt)
            .await?;
        self.credentials
            .store_password_hash(guid, new_hash, is_reset)
            .await?;
        info!("password changed for {username}");
        Ok(())
    }

    fn password_expired(&self, stored: &StoredPassword) -> bool {
        let days = self.policy.password_expiration_days();
        days > 0 && stored.changed_at + Duration::days(days) <= Utc::now()
    }

    async fn issue_token(&self, guid: Uuid) -> Result<String> {
        let salt = self.rotate_token_salt(guid).await?;
        Ok(crypto::hash_secret(
            &guid.to_string(),
            &salt,
            self.policy.iterations(),
            self.policy.key_length(),
            self.policy.digest_algorithm(),
        )?)
    }

    async fn rotate_token_salt(&self, guid: Uuid) -> Result<String> {
        let salt = crypto::generate_salt(
            self.policy.digest_algorithm(),
            self.policy.salt_length(),
        );
        self.credentials
            .store_salt(guid, SaltKind::Token, &salt)
            .await?;
        Ok(salt)
    }
}
