//! In-memory credential store for embedding and tests.
//!
//! Mirrors the relational backend's contract, including the
//! single-affected-row write semantics. Records are keyed by guid; the
//! username parameters exist for contract parity and auditability.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use super::{CredentialSeed, CredentialStore, ResetClaim, SaltKind, SecurityQa, StoredPassword};
use crate::error::StoreError;

#[derive(Clone, Debug)]
struct CredentialRow {
    password_hash: String,
    password_salt: String,
    token_salt: String,
    qa: Option<SecurityQa>,
    password_changed_at: DateTime<Utc>,
    groups: Vec<String>,
}

#[derive(Clone, Debug)]
struct ResetRow {
    reset_id: String,
    guid: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    credentials: HashMap<Uuid, CredentialRow>,
    resets: Vec<ResetRow>,
    questions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the security-question catalogue.
    pub async fn set_questions(&self, questions: Vec<String>) {
        self.inner.lock().await.questions = questions;
    }

    /// Attach group memberships to an account's record.
    pub async fn assign_groups(&self, guid: Uuid, groups: Vec<String>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .credentials
            .get_mut(&guid)
            .ok_or(StoreError::MissingRecord { guid })?;
        row.groups = groups;
        Ok(())
    }

    /// Fixture helper: age a password so expiration paths can be
    /// exercised without waiting.
    pub async fn backdate_password_change(
        &self,
        guid: Uuid,
        changed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .credentials
            .get_mut(&guid)
            .ok_or(StoreError::MissingRecord { guid })?;
        row.password_changed_at = changed_at;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert_credentials(
        &self,
        guid: Uuid,
        seed: &CredentialSeed,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.credentials.contains_key(&guid) {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        }
        inner.credentials.insert(
            guid,
            CredentialRow {
                password_hash: seed.password_hash.clone(),
                password_salt: seed.password_salt.clone(),
                token_salt: seed.token_salt.clone(),
                qa: None,
                password_changed_at: Utc::now(),
                groups: Vec::new(),
            },
        );
        Ok(())
    }

    async fn remove_credentials(&self, guid: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.credentials.remove(&guid).is_none() {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        }
        inner.resets.retain(|row| row.guid != guid);
        Ok(())
    }

    async fn salt(&self, guid: Uuid, kind: SaltKind) -> Result<String, StoreError> {
        let inner = self.inner.lock().await;
        let row = inner
            .credentials
            .get(&guid)
            .ok_or(StoreError::MissingRecord { guid })?;
        Ok(match kind {
            SaltKind::Password => row.password_salt.clone(),
            SaltKind::Token => row.token_salt.clone(),
        })
    }

    async fn store_salt(&self, guid: Uuid, kind: SaltKind, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(row) = inner.credentials.get_mut(&guid) else {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        };
        match kind {
            SaltKind::Password => row.password_salt = value.to_string(),
            SaltKind::Token => row.token_salt = value.to_string(),
        }
        Ok(())
    }

    async fn password_hash(
        &self,
        guid: Uuid,
        _username: &str,
    ) -> Result<StoredPassword, StoreError> {
        let inner = self.inner.lock().await;
        let row = inner
            .credentials
            .get(&guid)
            .ok_or(StoreError::MissingRecord { guid })?;
        Ok(StoredPassword {
            hash: row.password_hash.clone(),
            changed_at: row.password_changed_at,
        })
    }

    async fn store_password_hash(
        &self,
        guid: Uuid,
        new_hash: &str,
        is_reset: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(row) = inner.credentials.get_mut(&guid) else {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        };
        row.password_hash = new_hash.to_string();
        row.password_changed_at = Utc::now();
        if is_reset {
            inner.resets.retain(|row| row.guid != guid);
        }
        Ok(())
    }

    async fn security_questions(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.lock().await.questions.clone())
    }

    async fn user_security_qa(&self, guid: Uuid, _username: &str) -> Result<SecurityQa, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .credentials
            .get(&guid)
            .and_then(|row| row.qa.clone())
            .ok_or(StoreError::MissingRecord { guid })
    }

    async fn store_security_qa(&self, guid: Uuid, qa: &SecurityQa) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(row) = inner.credentials.get_mut(&guid) else {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        };
        row.qa = Some(qa.clone());
        Ok(())
    }

    async fn insert_reset_request(&self, guid: Uuid, reset_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        // One live request per guid: the new one replaces the old.
        inner.resets.retain(|row| row.guid != guid);
        inner.resets.push(ResetRow {
            reset_id: reset_id.to_string(),
            guid,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn consume_reset_request(
        &self,
        reset_id: &str,
    ) -> Result<Option<ResetClaim>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.resets.iter().position(|row| row.reset_id == reset_id) else {
            return Ok(None);
        };
        let row = inner.resets.remove(index);
        Ok(Some(ResetClaim {
            guid: row.guid,
            created_at: row.created_at,
        }))
    }

    async fn groups(&self, guid: Uuid, _username: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .credentials
            .get(&guid)
            .map(|row| row.groups.clone())
            .ok_or(StoreError::MissingRecord { guid })
    }
}
