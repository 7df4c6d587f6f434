pub mod migrations;
mod queries;

use docgate_core::AuditRecord;
use sqlx::PgPool;

use crate::account::{Account, AccountUpdate};
use crate::memory::InMemoryDocumentStore;
use crate::traits::{AccountStore, AuditStore, Backend, StorageError};

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AccountStore for PostgresAccountStore {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        queries::insert_account(&self.pool, account).await
    }

    async fn get(&self, user_id: &str) -> Result<Option<Account>, StorageError> {
        queries::select_account(&self.pool, user_id).await
    }

    async fn update(&self, user_id: &str, update: &AccountUpdate) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(queries::to_storage_error)?;

        let mut account = queries::select_account_for_update(&mut *tx, user_id)
            .await?
            .ok_or_else(|| StorageError::DocumentNotFound(format!("User '{user_id}' not found.")))?;
        account.apply(update);
        queries::replace_account(&mut *tx, &account).await?;

        tx.commit().await.map_err(queries::to_storage_error)
    }

    async fn delete(&self, user_id: &str) -> Result<(), StorageError> {
        match queries::delete_account(&self.pool, user_id).await? {
            0 => Err(StorageError::DocumentNotFound(format!(
                "User '{user_id}' not found."
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditStore for PostgresAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), StorageError> {
        queries::insert_audit_record(&self.pool, record).await
    }
}

/// Accounts and audit log in Postgres. Documents stay in process memory.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    documents: InMemoryDocumentStore,
    accounts: PostgresAccountStore,
    audit: PostgresAuditStore,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            documents: InMemoryDocumentStore::new(),
            accounts: PostgresAccountStore::new(pool.clone()),
            audit: PostgresAuditStore::new(pool),
        }
    }
}

impl Backend for PostgresBackend {
    type Documents = InMemoryDocumentStore;
    type Accounts = PostgresAccountStore;
    type Audit = PostgresAuditStore;

    fn documents(&self) -> &InMemoryDocumentStore {
        &self.documents
    }

    fn accounts(&self) -> &PostgresAccountStore {
        &self.accounts
    }

    fn audit(&self) -> &PostgresAuditStore {
        &self.audit
    }
}
