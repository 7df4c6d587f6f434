use docgate_core::AuditRecord;

use crate::account::{Account, AccountUpdate};
use crate::command::{Command, CommandResult, Target};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    DocumentNotFound(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Classification name recorded as `error.kind` in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::DocumentNotFound(_) => "DocumentNotFound",
            StorageError::DuplicateKey(_) => "DuplicateKey",
            StorageError::InvalidCommand(_) => "InvalidCommand",
            StorageError::Unavailable(_) => "Unavailable",
            StorageError::Internal(_) => "Internal",
        }
    }
}

/// Executes document commands. Not access-controlled: callers must authorize first.
pub trait DocumentStore: Send + Sync {
    fn execute(
        &self,
        target: &Target,
        command: Command,
    ) -> impl Future<Output = Result<CommandResult, StorageError>> + Send;
}

/// Append-only sink for audit records.
pub trait AuditStore: Send + Sync {
    fn append(&self, record: &AuditRecord) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait AccountStore: Send + Sync {
    fn create(&self, account: &Account) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Account>, StorageError>> + Send;

    fn update(
        &self,
        user_id: &str,
        update: &AccountUpdate,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete(&self, user_id: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait Backend: Send + Sync + 'static {
    type Documents: DocumentStore;
    type Accounts: AccountStore;
    type Audit: AuditStore;

    fn documents(&self) -> &Self::Documents;
    fn accounts(&self) -> &Self::Accounts;
    fn audit(&self) -> &Self::Audit;
}
