//! Credential persistence: salts, password hashes, security questions,
//! and online-reset requests.
//!
//! Plaintext never reaches this layer; callers hash passwords and
//! answers upstream. Every write is checked against an affected-row
//! count of exactly one; any other count is a contract violation
//! surfaced as [`StoreError::AffectedRows`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Which per-account salt a caller wants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaltKind {
    /// Mixed into the password hash.
    Password,
    /// Mixed into auth-token derivation; rotated on logon and logoff.
    Token,
}

impl SaltKind {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Password => "password_salt",
            Self::Token => "token_salt",
        }
    }
}

/// Stored password hash plus the change timestamp driving expiration.
#[derive(Clone, Debug)]
pub struct StoredPassword {
    pub hash: String,
    pub changed_at: DateTime<Utc>,
}

/// The two security questions and hashed answers for one account.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SecurityQa {
    pub question_one: String,
    pub question_two: String,
    pub answer_hash_one: String,
    pub answer_hash_two: String,
}

/// Initial credential row written at enrollment.
#[derive(Clone, Debug)]
pub struct CredentialSeed {
    pub password_hash: String,
    pub password_salt: String,
    pub token_salt: String,
}

/// A consumed reset request.
#[derive(Clone, Debug)]
pub struct ResetClaim {
    pub guid: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Storage contract for credentials. Backends are interchangeable as
/// long as the uniqueness and affected-row invariants hold.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_credentials(&self, guid: Uuid, seed: &CredentialSeed)
        -> Result<(), StoreError>;

    async fn remove_credentials(&self, guid: Uuid) -> Result<(), StoreError>;

    async fn salt(&self, guid: Uuid, kind: SaltKind) -> Result<String, StoreError>;

    async fn store_salt(&self, guid: Uuid, kind: SaltKind, value: &str) -> Result<(), StoreError>;

    async fn password_hash(&self, guid: Uuid, username: &str)
        -> Result<StoredPassword, StoreError>;

    /// Replace the password hash and stamp the change time. When the
    /// change came through the online-reset path (`is_reset`), any
    /// remaining reset requests for the account are cleared as well.
    async fn store_password_hash(
        &self,
        guid: Uuid,
        new_hash: &str,
        is_reset: bool,
    ) -> Result<(), StoreError>;

    /// The catalogue of questions offered during OLR setup.
    async fn security_questions(&self) -> Result<Vec<String>, StoreError>;

    async fn user_security_qa(&self, guid: Uuid, username: &str) -> Result<SecurityQa, StoreError>;

    async fn store_security_qa(&self, guid: Uuid, qa: &SecurityQa) -> Result<(), StoreError>;

    /// Record a new reset request, replacing any prior active request
    /// for the same guid, so at most one is live at a time.
    async fn insert_reset_request(&self, guid: Uuid, reset_id: &str) -> Result<(), StoreError>;

    /// Claim a reset request exactly once. `None` means the id is
    /// unknown or was already consumed; TTL enforcement is the
    /// caller's concern since the claim carries `created_at`.
    async fn consume_reset_request(&self, reset_id: &str)
        -> Result<Option<ResetClaim>, StoreError>;

    async fn groups(&self, guid: Uuid, username: &str) -> Result<Vec<String>, StoreError>;
}
