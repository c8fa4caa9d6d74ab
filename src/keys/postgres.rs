//! Relational key strategy.
//!
//! A failed or short insert is rolled back with a compensating delete
//! for the same guid before the error is raised, so no partial key row
//! ever survives.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{warn, Instrument};
use uuid::Uuid;

use super::{generate_keypair, KeyManager, KeyPair};
use crate::error::{KeyManagementError, StoreError};
use crate::sync::GuidLocks;

pub struct PgKeyManager {
    pool: PgPool,
    algorithm: String,
    locks: GuidLocks,
}

impl PgKeyManager {
    #[must_use]
    pub fn new(pool: PgPool, algorithm: impl Into<String>) -> Self {
        Self {
            pool,
            algorithm: algorithm.into(),
            locks: GuidLocks::new(),
        }
    }

    async fn compensating_delete(&self, guid: Uuid) {
        let query = "DELETE FROM user_keys WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        if let Err(err) = sqlx::query(query)
            .bind(guid)
            .execute(&self.pool)
            .instrument(span)
            .await
        {
            // The original failure is what callers need to see; the
            // cleanup failure is only logged.
            warn!("compensating key delete for {guid} failed: {err}");
        }
    }
}

#[async_trait]
impl KeyManager for PgKeyManager {
    async fn create_keys(&self, guid: Uuid) -> Result<(), KeyManagementError> {
        let _guard = self.locks.acquire(guid).await;

        let (public_key, private_key) = generate_keypair(&self.algorithm)?;

        let query = r"
            INSERT INTO user_keys (guid, public_key, private_key)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(&public_key)
            .bind(&private_key)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(outcome) if outcome.rows_affected() == 1 => Ok(()),
            Ok(outcome) => {
                self.compensating_delete(guid).await;
                Err(StoreError::AffectedRows {
                    expected: 1,
                    actual: outcome.rows_affected(),
                }
                .into())
            }
            Err(err) => {
                self.compensating_delete(guid).await;
                Err(StoreError::from(err).into())
            }
        }
    }

    async fn return_keys(&self, guid: Uuid) -> Result<KeyPair, KeyManagementError> {
        let query = "SELECT public_key, private_key FROM user_keys WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(guid)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::from)?
            .ok_or(KeyManagementError::NotFound { guid })?;

        Ok(KeyPair {
            guid,
            public_key: row.get("public_key"),
            private_key: row.get("private_key"),
        })
    }

    async fn remove_keys(&self, guid: Uuid) -> Result<(), KeyManagementError> {
        let _guard = self.locks.acquire(guid).await;

        let query = "DELETE FROM user_keys WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::from)?;

        match result.rows_affected() {
            1 => Ok(()),
            0 => Err(KeyManagementError::NotFound { guid }),
            actual => Err(StoreError::AffectedRows {
                expected: 1,
                actual,
            }
            .into()),
        }
    }
}
