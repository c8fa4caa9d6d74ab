//! PostgreSQL-backed account store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{AccountStore, Role, SearchField, UserAccount};
use crate::auth::LoginStatus;
use crate::error::StoreError;
use crate::store::expect_one;

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACCOUNT_COLUMNS: &str = r"
    guid, username, email, role, failed_count, locked, suspended,
    olr_setup, olr_locked, groups, last_login
";

fn account_from_row(row: &PgRow) -> Result<UserAccount, StoreError> {
    let role: String = row.get("role");
    let role = Role::from_name(&role)
        .ok_or_else(|| StoreError::Malformed(format!("unknown role {role:?}")))?;

    Ok(UserAccount {
        guid: row.get("guid"),
        username: row.get("username"),
        email: row.get("email"),
        role,
        // Volatile fields: the store never persists session state.
        status: LoginStatus::Anonymous,
        failed_count: row.get("failed_count"),
        locked: row.get("locked"),
        suspended: row.get("suspended"),
        olr_setup: row.get("olr_setup"),
        olr_locked: row.get("olr_locked"),
        auth_token: None,
        session_id: None,
        groups: row.get("groups"),
        last_login: row.get("last_login"),
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, account: &UserAccount) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO user_accounts
                (guid, username, email, role, failed_count, locked, suspended,
                 olr_setup, olr_locked, groups, last_login)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account.guid)
            .bind(&account.username)
            .bind(&account.email)
            .bind(account.role.as_str())
            .bind(account.failed_count)
            .bind(account.locked)
            .bind(account.suspended)
            .bind(account.olr_setup)
            .bind(account.olr_locked)
            .bind(&account.groups)
            .bind(account.last_login)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn delete(&self, guid: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM user_accounts WHERE guid = $1";
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

    async fn fetch(&self, guid: Uuid) -> Result<Vec<UserAccount>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM user_accounts WHERE guid = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .bind(guid)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    async fn search(&self, field: SearchField, term: &str) -> Result<Vec<UserAccount>, StoreError> {
        let query = match field {
            SearchField::Email => format!(
                "SELECT {ACCOUNT_COLUMNS} FROM user_accounts WHERE lower(email) = lower($1)"
            ),
            SearchField::General => format!(
                "SELECT {ACCOUNT_COLUMNS} FROM user_accounts WHERE username ILIKE '%' || $1 || '%'"
            ),
        };
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .bind(term)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    async fn list(&self) -> Result<Vec<UserAccount>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM user_accounts ORDER BY username");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    async fn update_suspension(&self, guid: Uuid, suspended: bool) -> Result<(), StoreError> {
        let query = "UPDATE user_accounts SET suspended = $2 WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(suspended)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn update_role(&self, username: &str, role: Role) -> Result<(), StoreError> {
        let query = "UPDATE user_accounts SET role = $2 WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(username)
            .bind(role.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn update_olr_lock(&self, guid: Uuid, locked: bool) -> Result<(), StoreError> {
        let query = "UPDATE user_accounts SET olr_locked = $2 WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(locked)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn update_olr_setup(&self, guid: Uuid, configured: bool) -> Result<(), StoreError> {
        let query = "UPDATE user_accounts SET olr_setup = $2 WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .bind(configured)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn adjust_lock(&self, guid: Uuid, locked: bool, delta: i32) -> Result<(), StoreError> {
        let query = r"
            UPDATE user_accounts
            SET failed_count = GREATEST(failed_count + $2, 0),
                locked = $3
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
            .bind(delta)
            .bind(locked)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn clear_lock(&self, guid: Uuid) -> Result<(), StoreError> {
        let query = r"
            UPDATE user_accounts
            SET failed_count = 0,
                locked = FALSE
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
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }

    async fn record_login(&self, guid: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE user_accounts SET last_login = NOW() WHERE guid = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(guid)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        expect_one(&result)
    }
}
