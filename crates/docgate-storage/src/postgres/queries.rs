use std::collections::BTreeMap;

use docgate_core::{AuditRecord, PermissionSet};
use sqlx::types::Json;

use crate::account::Account;
use crate::traits::StorageError;

pub(crate) fn to_storage_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StorageError::DuplicateKey(db_err.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(e.to_string())
        }
        other => StorageError::Internal(other.to_string()),
    }
}

type AccountRow = (
    String,
    String,
    String,
    Json<PermissionSet>,
    bool,
    Json<BTreeMap<String, String>>,
);

fn account_from_row(row: AccountRow) -> Account {
    let (user_id, api_key_hash, policy, permissions, user_management, metadata) = row;
    Account {
        user_id,
        api_key_hash,
        policy,
        permissions: permissions.0,
        user_management,
        metadata: metadata.0,
    }
}

pub async fn insert_account<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    account: &Account,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO accounts (user_id, api_key_hash, policy, permissions, user_management, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&account.user_id)
    .bind(&account.api_key_hash)
    .bind(&account.policy)
    .bind(Json(&account.permissions))
    .bind(account.user_management)
    .bind(Json(&account.metadata))
    .execute(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StorageError::DuplicateKey(format!(
                "User '{}' already exists.",
                account.user_id
            ));
        }
        to_storage_error(e)
    })?;
    Ok(())
}

const SELECT_ACCOUNT: &str = r#"
    SELECT user_id, api_key_hash, policy, permissions, user_management, metadata
    FROM accounts
    WHERE user_id = $1
"#;

const SELECT_ACCOUNT_FOR_UPDATE: &str = r#"
    SELECT user_id, api_key_hash, policy, permissions, user_management, metadata
    FROM accounts
    WHERE user_id = $1
    FOR UPDATE
"#;

pub async fn select_account<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &str,
) -> Result<Option<Account>, StorageError> {
    fetch_account(executor, SELECT_ACCOUNT, user_id).await
}

/// Locks the row until the surrounding transaction ends.
pub async fn select_account_for_update<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &str,
) -> Result<Option<Account>, StorageError> {
    fetch_account(executor, SELECT_ACCOUNT_FOR_UPDATE, user_id).await
}

async fn fetch_account<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    sql: &'static str,
    user_id: &str,
) -> Result<Option<Account>, StorageError> {
    let row: Option<AccountRow> = sqlx::query_as(sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;

    Ok(row.map(account_from_row))
}

pub async fn replace_account<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    account: &Account,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET policy = $2, permissions = $3, user_management = $4, updated_at = now()
        WHERE user_id = $1
        "#,
    )
    .bind(&account.user_id)
    .bind(&account.policy)
    .bind(Json(&account.permissions))
    .bind(account.user_management)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(result.rows_affected())
}

pub async fn delete_account<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    user_id: &str,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;

    Ok(result.rows_affected())
}

pub async fn insert_audit_record<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    record: &AuditRecord,
) -> Result<(), StorageError> {
    let header = record.header();
    sqlx::query(
        r#"
        INSERT INTO audit_log (recorded_at, outcome, action, user_id, record)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(header.timestamp)
    .bind(record.outcome())
    .bind(&header.action)
    .bind(&header.user_id)
    .bind(Json(record))
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}
