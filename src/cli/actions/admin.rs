//! Handlers for the administrative actions.

use anyhow::{bail, Context, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use super::Action;
use crate::accounts::postgres::PgAccountStore;
use crate::accounts::{AccountManager, UserAccount};
use crate::credentials::postgres::PgCredentialStore;
use crate::credentials::{CredentialSeed, CredentialStore};
use crate::crypto;
use crate::keys::file::FileKeyManager;
use crate::keys::postgres::PgKeyManager;
use crate::keys::KeyManager;
use crate::policy::SecurityPolicy;

async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

async fn key_manager(
    dsn: &str,
    key_root: Option<PathBuf>,
    policy: &SecurityPolicy,
) -> Result<Box<dyn KeyManager>> {
    // The strategy is chosen by configuration, not recompilation.
    match key_root {
        Some(root) => Ok(Box::new(FileKeyManager::new(root, policy.key_algorithm()))),
        None => Ok(Box::new(PgKeyManager::new(
            connect(dsn).await?,
            policy.key_algorithm(),
        ))),
    }
}

/// Handle one administrative action.
///
/// # Errors
/// Returns an error when the database is unreachable or the underlying
/// operation fails.
pub async fn handle(dsn: &str, action: Action) -> Result<()> {
    let policy = SecurityPolicy::default();

    match action {
        Action::AccountCreate {
            username,
            email,
            role,
            password,
            groups,
        } => {
            let password_len = password.expose_secret().chars().count();
            if password_len < policy.password_min_length()
                || password_len > policy.password_max_length()
            {
                bail!(
                    "password length must be between {} and {} characters",
                    policy.password_min_length(),
                    policy.password_max_length()
                );
            }

            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool.clone())));
            let credentials = PgCredentialStore::new(pool);

            let guid = Uuid::new_v4();
            let mut account = UserAccount::new(guid, username, email, role);
            account.groups = groups;
            accounts.create(&account).await?;

            // Hash client-side; the stores only ever see derived values.
            let password_salt =
                crypto::generate_salt(policy.digest_algorithm(), policy.salt_length());
            let token_salt = crypto::generate_salt(policy.digest_algorithm(), policy.salt_length());
            let password_hash = crypto::hash_secret(
                password.expose_secret(),
                &password_salt,
                policy.iterations(),
                policy.key_length(),
                policy.digest_algorithm(),
            )?;
            let seed = CredentialSeed {
                password_hash,
                password_salt,
                token_salt,
            };

            if let Err(err) = credentials.insert_credentials(guid, &seed).await {
                // Compensating removal keeps account and credential rows
                // in step when enrollment fails halfway.
                if let Err(cleanup) = accounts.remove(guid).await {
                    error!("cleanup of {guid} after failed enrollment also failed: {cleanup}");
                }
                return Err(err.into());
            }

            println!("{guid}");
        }
        Action::AccountRemove { guid } => {
            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool.clone())));
            let credentials = PgCredentialStore::new(pool);

            credentials.remove_credentials(guid).await?;
            accounts.remove(guid).await?;
            println!("removed {guid}");
        }
        Action::AccountUnlock { guid } => {
            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool)));
            accounts.set_lock(guid, false, 0).await?;
            println!("unlocked {guid}");
        }
        Action::AccountSuspend { guid, lift } => {
            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool)));
            accounts.set_suspended(guid, !lift).await?;
            println!("{} {guid}", if lift { "unsuspended" } else { "suspended" });
        }
        Action::AccountSetRole { username, role } => {
            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool)));
            accounts.set_role(&username, role).await?;
            println!("{username} is now {}", role.as_str());
        }
        Action::AccountShow { term } => {
            let pool = connect(dsn).await?;
            let accounts = AccountManager::new(Arc::new(PgAccountStore::new(pool)));
            let matches = accounts.find(&term).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Action::KeysCreate { guid, key_root } => {
            let manager = key_manager(dsn, key_root, &policy).await?;
            manager.create_keys(guid).await?;
            println!("created key pair for {guid}");
        }
        Action::KeysRemove { guid, key_root } => {
            let manager = key_manager(dsn, key_root, &policy).await?;
            manager.remove_keys(guid).await?;
            println!("removed key pair for {guid}");
        }
    }

    Ok(())
}
