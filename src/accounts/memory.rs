//! In-memory account store for embedding and tests.
//!
//! Records live in a flat list and are scanned linearly, so the store
//! itself cannot enforce uniqueness; that stays with the manager,
//! which also makes ambiguous data representable for testing.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountStore, Role, SearchField, UserAccount};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<Vec<UserAccount>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_one<F>(&self, guid: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut UserAccount),
    {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.iter_mut().find(|account| account.guid == guid) else {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        };
        apply(account);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, account: &UserAccount) -> Result<(), StoreError> {
        self.accounts.lock().await.push(account.clone());
        Ok(())
    }

    async fn delete(&self, guid: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let before = accounts.len();
        accounts.retain(|account| account.guid != guid);
        match before - accounts.len() {
            1 => Ok(()),
            actual => Err(StoreError::AffectedRows {
                expected: 1,
                actual: actual as u64,
            }),
        }
    }

    async fn fetch(&self, guid: Uuid) -> Result<Vec<UserAccount>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .iter()
            .filter(|account| account.guid == guid)
            .cloned()
            .collect())
    }

    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<UserAccount>, StoreError> {
        let term_lower = term.to_lowercase();
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .iter()
            .filter(|account| match field {
                SearchField::Email => account.email.to_lowercase() == term_lower,
                SearchField::General => account.username.to_lowercase().contains(&term_lower),
            })
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        Ok(self.accounts.lock().await.clone())
    }

    async fn update_suspension(&self, guid: Uuid, suspended: bool) -> Result<(), StoreError> {
        self.update_one(guid, |account| account.suspended = suspended)
            .await
    }

    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts
            .iter_mut()
            .find(|account| account.username == username)
        else {
            return Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0,
            });
        };
        account.role = role;
        Ok(())
    }

    async fn update_olr_lock(&self, guid: Uuid, locked: bool) -> Result<(), StoreError> {
        self.update_one(guid, |account| account.olr_locked = locked)
            .await
    }

    async fn update_olr_setup(&self, guid: Uuid, configured: bool) -> Result<(), StoreError> {
        self.update_one(guid, |account| account.olr_setup = configured)
            .await
    }

    async fn adjust_lock(&self, guid: Uuid, locked: bool, delta: i32) -> Result<(), StoreError> {
        self.update_one(guid, |account| {
            account.failed_count = (account.failed_count + delta).max(0);
            account.locked = locked;
        })
        .await
    }

    async fn clear_lock(&self, guid: Uuid) -> Result<(), StoreError> {
        self.update_one(guid, |account| {
            account.failed_count = 0;
            account.locked = false;
        })
        .await
    }

    async fn record_login(&self, guid: Uuid) -> Result<(), StoreError> {
        self.update_one(guid, |account| account.last_login = Some(Utc::now()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str) -> UserAccount {
        UserAccount::new(
            Uuid::new_v4(),
            username,
            format!("{username}@example.com"),
            Role::Member,
        )
    }

    #[tokio::test]
    async fn delete_reports_affected_rows() {
        let store = MemoryAccountStore::new();
        let result = store.delete(Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(StoreError::AffectedRows {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[tokio::test]
    async fn adjust_lock_floors_the_count_at_zero() {
        let store = MemoryAccountStore::new();
        let account = account("khuntly");
        let guid = account.guid;
        store.insert(&account).await.unwrap();

        store.adjust_lock(guid, false, -5).await.unwrap();
        let fetched = store.fetch(guid).await.unwrap();
        assert_eq!(fetched[0].failed_count, 0);
    }

    #[tokio::test]
    async fn search_routes_by_field() {
        let store = MemoryAccountStore::new();
        store.insert(&account("khuntly")).await.unwrap();
        store.insert(&account("chuntly")).await.unwrap();

        let by_email = store
            .search(SearchField::Email, "KHUNTLY@example.com")
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);

        let general = store.search(SearchField::General, "huntly").await.unwrap();
        assert_eq!(general.len(), 2);
    }
}
