//! Shared helpers for the relational backends.

use sqlx::postgres::PgQueryResult;

use crate::error::StoreError;

/// Enforce the single-row write contract: any affected-row count other
/// than one is surfaced, never silently ignored.
pub(crate) fn expect_one(result: &PgQueryResult) -> Result<(), StoreError> {
    match result.rows_affected() {
        1 => Ok(()),
        actual => Err(StoreError::AffectedRows {
            expected: 1,
            actual,
        }),
    }
}
