//! Filesystem key strategy.
//!
//! Layout: `<root>/<guid>/<guid>.pub` and `<root>/<guid>/<guid>.priv`,
//! directory and files created owner-only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use super::{generate_keypair, KeyManager, KeyPair};
use crate::error::KeyManagementError;
use crate::sync::GuidLocks;

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

pub struct FileKeyManager {
    root: PathBuf,
    algorithm: String,
    locks: GuidLocks,
}

impl FileKeyManager {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, algorithm: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            algorithm: algorithm.into(),
            locks: GuidLocks::new(),
        }
    }

    fn key_dir(&self, guid: Uuid) -> PathBuf {
        self.root.join(guid.to_string())
    }

    fn public_path(&self, guid: Uuid) -> PathBuf {
        self.key_dir(guid).join(format!("{guid}.pub"))
    }

    fn private_path(&self, guid: Uuid) -> PathBuf {
        self.key_dir(guid).join(format!("{guid}.priv"))
    }
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

async fn read_key_file(path: &Path, guid: Uuid) -> Result<Vec<u8>, KeyManagementError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(KeyManagementError::NotFound { guid })
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl KeyManager for FileKeyManager {
    async fn create_keys(&self, guid: Uuid) -> Result<(), KeyManagementError> {
        let _guard = self.locks.acquire(guid).await;

        // Never regenerate in place; callers must remove first.
        if fs::try_exists(self.public_path(guid)).await?
            || fs::try_exists(self.private_path(guid)).await?
        {
            return Err(KeyManagementError::AlreadyExists { guid });
        }

        let (public_key, private_key) = generate_keypair(&self.algorithm)?;

        let dir = self.key_dir(guid);
        fs::create_dir_all(&dir).await?;
        restrict(&dir, DIR_MODE).await?;

        for (path, bytes) in [
            (self.public_path(guid), &public_key),
            (self.private_path(guid), &private_key),
        ] {
            fs::write(&path, bytes).await?;
            restrict(&path, FILE_MODE).await?;
        }

        Ok(())
    }

    async fn return_keys(&self, guid: Uuid) -> Result<KeyPair, KeyManagementError> {
        let _guard = self.locks.acquire(guid).await;

        let public_key = read_key_file(&self.public_path(guid), guid).await?;
        let private_key = read_key_file(&self.private_path(guid), guid).await?;

        Ok(KeyPair {
            guid,
            public_key,
            private_key,
        })
    }

    async fn remove_keys(&self, guid: Uuid) -> Result<(), KeyManagementError> {
        let _guard = self.locks.acquire(guid).await;

        let dir = self.key_dir(guid);
        if !fs::try_exists(&dir).await? {
            return Err(KeyManagementError::NotFound { guid });
        }

        // Files are deleted individually; the directory only goes away
        // once every deletion succeeded. A partial failure leaves the
        // directory intact so the remains stay visible.
        let mut failed = false;
        for path in [self.public_path(guid), self.private_path(guid)] {
            if let Err(err) = fs::remove_file(&path).await {
                if err.kind() != ErrorKind::NotFound {
                    warn!("failed to delete key file {}: {err}", path.display());
                    failed = true;
                }
            }
        }
        if failed {
            return Err(KeyManagementError::PartialRemoval { guid });
        }

        fs::remove_dir(&dir).await?;
        Ok(())
    }
}
