//! Error taxonomy for the account security core.
//!
//! Component errors stay typed so the session authority can map every
//! kind onto a redirect; anything it does not recognize fails closed.

use thiserror::Error;
use uuid::Uuid;

/// Failures inside the password and cipher primitives.
///
/// Padding, key, and format problems all collapse into opaque variants
/// so callers cannot leak which one occurred to an end user.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("cipher operation failed")]
    CipherFailure,
    #[error("malformed cipher payload")]
    MalformedPayload,
}

/// Relational-store failures shared by the credential, account, and key
/// backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation failed: {0}")]
    Backend(#[from] sqlx::Error),
    /// A write touched a number of rows the contract does not allow.
    #[error("expected {expected} affected row(s), saw {actual}")]
    AffectedRows { expected: u64, actual: u64 },
    #[error("no record found for {guid}")]
    MissingRecord { guid: Uuid },
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Key lifecycle failures.
#[derive(Debug, Error)]
pub enum KeyManagementError {
    #[error("no key pair stored for {guid}")]
    NotFound { guid: Uuid },
    #[error("a key pair already exists for {guid}")]
    AlreadyExists { guid: Uuid },
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("key store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// One or more key files could not be deleted; the directory is left
    /// in place so the remains stay visible.
    #[error("partial key removal for {guid}, directory left intact")]
    PartialRemoval { guid: Uuid },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Crate-level error: everything the session authority must map to a
/// redirect decision.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    KeyManagement(#[from] KeyManagementError),
    #[error("account {username}/{guid} collides with an existing account")]
    DuplicateAccount { username: String, guid: Uuid },
    #[error("lookup matched {matched} accounts, expected exactly one")]
    AmbiguousAccount { matched: usize },
    #[error("no account found for {guid}")]
    AccountNotFound { guid: Uuid },
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("account is locked")]
    AccountLocked,
    #[error("online reset is locked for this account")]
    OlrLocked,
    #[error("online reset questions are not configured")]
    OlrNotConfigured,
    #[error("reset request has expired")]
    ResetExpired,
    #[error("reset request is unknown or already consumed")]
    ResetConsumed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
