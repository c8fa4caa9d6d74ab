//! PostgreSQL-backed credential store.
//!
//! Connections come from the shared pool and are returned on every exit
//! path; no connection is held beyond a single operation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{CredentialSeed, CredentialStore, ResetClaim, SaltKind, SecurityQa, StoredPassword};
use crate::error::StoreError;
use crate::store::expect_one;

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_credentials(
        &self,
        guid: Uuid,
        seed: &CredentialSeed,
    ) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO user_credentials
                (guid, password_hash, password_salt, token_salt, password_changed_at)
            VALUES ($1, $2, $3, $4, NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(&seed.password_hash)
            .bind(&seed.password_salt)
            .bind(&seed.token_salt)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn remove_credentials(&self, guid: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM user_credentials WHERE guid = $1";
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
            .await?;
        expect_one(&result)
    }

    async fn salt(&self, guid: Uuid, kind: SaltKind) -> Result<String, StoreError> {
        // The column name comes from SaltKind, never from caller input.
        let query = format!(
            "SELECT {} AS salt FROM user_credentials WHERE guid = $1",
            kind.column()
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(guid)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.map(|row| row.get("salt"))
            .ok_or(StoreError::MissingRecord { guid })
    }

    async fn store_salt(&self, guid: Uuid, kind: SaltKind, value: &str) -> Result<(), StoreError> {
        let query = format!(
            "UPDATE user_credentials SET {} = $2 WHERE guid = $1",
            kind.column()
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let result = sqlx::query(&query)
            .bind(guid)
            .bind(value)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn password_hash(
        &self,
        guid: Uuid,
        username: &str,
    ) -> Result<StoredPassword, StoreError> {
        let query = r"
            SELECT c.password_hash, c.password_changed_at
            FROM user_credentials c
            JOIN user_accounts a ON a.guid = c.guid
            WHERE c.guid = $1
              AND a.username = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(guid)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.map(|row| StoredPassword {
            hash: row.get("password_hash"),
            changed_at: row.get("password_changed_at"),
        })
        .ok_or(StoreError::MissingRecord { guid })
    }

    async fn store_password_hash(
        &self,
        guid: Uuid,
        new_hash: &str,
        is_reset: bool,
    ) -> Result<(), StoreError> {
        let query = r"
            UPDATE user_credentials
            SET password_hash = $2,
                password_changed_at = NOW()
            WHERE guid = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(new_hash)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)?;

        if is_reset {
            // A reset-driven change retires whatever request let it happen.
            let query = "DELETE FROM password_resets WHERE guid = $1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(guid)
                .execute(&self.pool)
                .instrument(span)
                .await?;
        }

        Ok(())
    }

    async fn security_questions(&self) -> Result<Vec<String>, StoreError> {
        let query = "SELECT question FROM security_questions ORDER BY position";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("question")).collect())
    }

    async fn user_security_qa(&self, guid: Uuid, username: &str) -> Result<SecurityQa, StoreError> {
        let query = r"
            SELECT c.question_one, c.question_two, c.answer_hash_one, c.answer_hash_two
            FROM user_credentials c
            JOIN user_accounts a ON a.guid = c.guid
            WHERE c.guid = $1
              AND a.username = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(guid)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
            .ok_or(StoreError::MissingRecord { guid })?;

        // Accounts that never finished OLR setup have NULL question rows.
        let question_one: Option<String> = row.get("question_one");
        let question_two: Option<String> = row.get("question_two");
        let answer_hash_one: Option<String> = row.get("answer_hash_one");
        let answer_hash_two: Option<String> = row.get("answer_hash_two");

        match (question_one, question_two, answer_hash_one, answer_hash_two) {
            (Some(question_one), Some(question_two), Some(answer_hash_one), Some(answer_hash_two)) => {
                Ok(SecurityQa {
                    question_one,
                    question_two,
                    answer_hash_one,
                    answer_hash_two,
                })
            }
            _ => Err(StoreError::MissingRecord { guid }),
        }
    }

    async fn store_security_qa(&self, guid: Uuid, qa: &SecurityQa) -> Result<(), StoreError> {
        let query = r"
            UPDATE user_credentials
            SET question_one = $2,
                question_two = $3,
                answer_hash_one = $4,
                answer_hash_two = $5
            WHERE guid = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(&qa.question_one)
            .bind(&qa.question_two)
            .bind(&qa.answer_hash_one)
            .bind(&qa.answer_hash_two)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn insert_reset_request(&self, guid: Uuid, reset_id: &str) -> Result<(), StoreError> {
        // Replacing the prior request and inserting the new one must
        // land together, so both run in one transaction.
        let mut tx = self.pool.begin().await?;

        let query = "DELETE FROM password_resets WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(guid)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        let query = r"
            INSERT INTO password_resets (reset_id, guid, created_at)
            VALUES ($1, $2, NOW())
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(reset_id)
            .bind(guid)
            .execute(&mut *tx)
            .instrument(span)
            .await?;
        expect_one(&result)?;

        tx.commit().await?;
        Ok(())
    }

    async fn consume_reset_request(
        &self,
        reset_id: &str,
    ) -> Result<Option<ResetClaim>, StoreError> {
        // DELETE .. RETURNING claims the row atomically; a second caller
        // with the same id sees nothing.
        let query = r"
            DELETE FROM password_resets
            WHERE reset_id = $1
            RETURNING guid, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(reset_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| ResetClaim {
            guid: row.get("guid"),
            created_at: row.get("created_at"),
        }))
    }

    async fn groups(&self, guid: Uuid, username: &str) -> Result<Vec<String>, StoreError> {
        let query = r"
            SELECT groups
            FROM user_accounts
            WHERE guid = $1
              AND username = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(guid)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        row.map(|row| row.get("groups"))
            .ok_or(StoreError::MissingRecord { guid })
    }
}
