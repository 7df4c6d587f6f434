mod documents;

pub use documents::InMemoryDocumentStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use docgate_core::AuditRecord;

use crate::account::{Account, AccountUpdate};
use crate::traits::{AccountStore, AuditStore, Backend, StorageError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&account.user_id) {
            return Err(StorageError::DuplicateKey(format!(
                "User '{}' already exists.",
                account.user_id
            )));
        }
        accounts.insert(account.user_id.clone(), account.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts.lock().unwrap().get(user_id).cloned())
    }

    async fn update(&self, user_id: &str, update: &AccountUpdate) -> Result<(), StorageError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(user_id)
            .ok_or_else(|| StorageError::DocumentNotFound(format!("User '{user_id}' not found.")))?;
        account.apply(update);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), StorageError> {
        self.accounts
            .lock()
            .unwrap()
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::DocumentNotFound(format!("User '{user_id}' not found.")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditStore {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Makes subsequent appends fail with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("audit sink offline".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    documents: InMemoryDocumentStore,
    accounts: InMemoryAccountStore,
    audit: InMemoryAuditStore,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for InMemoryBackend {
    type Documents = InMemoryDocumentStore;
    type Accounts = InMemoryAccountStore;
    type Audit = InMemoryAuditStore;

    fn documents(&self) -> &InMemoryDocumentStore {
        &self.documents
    }

    fn accounts(&self) -> &InMemoryAccountStore {
        &self.accounts
    }

    fn audit(&self) -> &InMemoryAuditStore {
        &self.audit
    }
}
