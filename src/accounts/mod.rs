//! Account records and the manager enforcing uniqueness, lookup
//! routing, and lock bookkeeping.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::LoginStatus;
use crate::error::{Error, Result, StoreError};
use crate::sync::GuidLocks;

/// Account roles, stored lowercase.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
    ReadOnly,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
            Self::ReadOnly => "readonly",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "readonly" => Some(Self::ReadOnly),
            _ => None,
        }
    }
}

/// One account as the stores and the session see it.
///
/// `status`, `auth_token`, and `session_id` are session-scoped: the
/// authenticator fills them in and nothing here is persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAccount {
    pub guid: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub status: LoginStatus,
    pub failed_count: i32,
    pub locked: bool,
    pub suspended: bool,
    pub olr_setup: bool,
    pub olr_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub groups: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserAccount {
    #[must_use]
    pub fn new(guid: Uuid, username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            guid,
            username: username.into(),
            email: email.into(),
            role,
            status: LoginStatus::Anonymous,
            failed_count: 0,
            locked: false,
            suspended: false,
            olr_setup: false,
            olr_locked: false,
            auth_token: None,
            session_id: None,
            groups: Vec::new(),
            last_login: None,
        }
    }

    /// Effective lock state: the administrative flag or the derived
    /// failed-count threshold.
    #[must_use]
    pub fn is_locked(&self, max_attempts: i32) -> bool {
        self.locked || self.failed_count >= max_attempts
    }
}

/// Which lookup a search term routes to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchField {
    Email,
    General,
}

/// Primitive account persistence. The manager layers the uniqueness,
/// ambiguity, and serialization rules on top.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, account: &UserAccount) -> Result<(), StoreError>;

    async fn delete(&self, guid: Uuid) -> Result<(), StoreError>;

    /// Raw fetch by guid; the manager decides what zero or several
    /// matches mean.
    async fn fetch(&self, guid: Uuid) -> Result<Vec<UserAccount>, StoreError>;

    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<UserAccount>, StoreError>;

    async fn list(&self) -> Result<Vec<UserAccount>, StoreError>;

    async fn update_suspension(&self, guid: Uuid, suspended: bool) -> Result<(), StoreError>;

    /// Single affected-row update keyed by username and role.
    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError>;

    async fn update_olr_lock(&self, guid: Uuid, locked: bool) -> Result<(), StoreError>;

    async fn update_olr_setup(&self, guid: Uuid, configured: bool) -> Result<(), StoreError>;

    /// Atomically adjust the failed count and set or clear the lock
    /// flag in one operation. The count never drops below zero.
    async fn adjust_lock(&self, guid: Uuid, locked: bool, delta: i32) -> Result<(), StoreError>;

    /// Zero the failed count and clear the flag.
    async fn clear_lock(&self, guid: Uuid) -> Result<(), StoreError>;

    async fn record_login(&self, guid: Uuid) -> Result<(), StoreError>;
}

/// Account CRUD plus the invariants the stores cannot express:
/// guid/username uniqueness, exactly-one load semantics, email-shaped
/// search routing, and per-account lock serialization.
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    locks: Arc<GuidLocks>,
}

impl AccountManager {
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            locks: Arc::new(GuidLocks::new()),
        }
    }

    /// Scan existing records for a guid or username collision.
    ///
    /// # Errors
    /// Returns `Error::DuplicateAccount` when either field collides;
    /// `Ok(true)` only when no collision exists.
    pub async fn validate_unique(&self, username: &str, guid: Uuid) -> Result<bool> {
        let accounts = self.store.list().await?;
        for existing in &accounts {
            if existing.guid == guid || existing.username.eq_ignore_ascii_case(username) {
                return Err(Error::DuplicateAccount {
                    username: username.to_string(),
                    guid,
                });
            }
        }
        Ok(true)
    }

    /// Create an account after the uniqueness scan passes.
    pub async fn create(&self, account: &UserAccount) -> Result<()> {
        self.validate_unique(&account.username, account.guid).await?;
        self.store.insert(account).await?;
        Ok(())
    }

    pub async fn remove(&self, guid: Uuid) -> Result<()> {
        self.store.delete(guid).await?;
        Ok(())
    }

    /// Route email-shaped terms to the email lookup, everything else to
    /// the general attribute lookup.
    pub async fn find(&self, term: &str) -> Result<Vec<UserAccount>> {
        let field = if email_shaped(term) {
            SearchField::Email
        } else {
            SearchField::General
        };
        Ok(self.store.search(field, term).await?)
    }

    /// Load exactly one account.
    ///
    /// # Errors
    /// Zero matches is `Error::AccountNotFound`; more than one is
    /// `Error::AmbiguousAccount`, never "pick first".
    pub async fn load(&self, guid: Uuid) -> Result<UserAccount> {
        let mut matches = self.store.fetch(guid).await?;
        match matches.len() {
            0 => Err(Error::AccountNotFound { guid }),
            1 => Ok(matches.remove(0)),
            matched => Err(Error::AmbiguousAccount { matched }),
        }
    }

    pub async fn set_suspended(&self, guid: Uuid, suspended: bool) -> Result<()> {
        self.store.update_suspension(guid, suspended).await?;
        Ok(())
    }

    pub async fn set_role(&self, username: &str, role: Role) -> Result<()> {
        self.store.update_role(username, role).await?;
        Ok(())
    }

    pub async fn set_olr_lock(&self, guid: Uuid, locked: bool) -> Result<()> {
        self.store.update_olr_lock(guid, locked).await?;
        Ok(())
    }

    pub async fn mark_olr_configured(&self, guid: Uuid) -> Result<()> {
        self.store.update_olr_setup(guid, true).await?;
        Ok(())
    }

    /// Adjust the failed count by `increment` and set or clear the lock
    /// flag, serialized per account. `(false, 0)` is the administrative
    /// unlock: count zeroed, flag cleared.
    pub async fn set_lock(&self, guid: Uuid, locked: bool, increment: i32) -> Result<()> {
        let _guard = self.locks.acquire(guid).await;
        if !locked && increment == 0 {
            self.store.clear_lock(guid).await?;
        } else {
            self.store.adjust_lock(guid, locked, increment).await?;
        }
        Ok(())
    }

    pub async fn record_login(&self, guid: Uuid) -> Result<()> {
        self.store.record_login(guid).await?;
        Ok(())
    }
}

/// Whether a search term should route to the email lookup.
fn email_shaped(term: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(term))
}
