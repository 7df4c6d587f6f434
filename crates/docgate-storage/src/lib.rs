pub mod account;
pub mod command;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use account::{Account, AccountUpdate};
pub use command::{Command, CommandResult, Document, FindOptions, Target};
pub use memory::{InMemoryAccountStore, InMemoryAuditStore, InMemoryBackend, InMemoryDocumentStore};
pub use postgres::{PostgresAccountStore, PostgresAuditStore, PostgresBackend};
pub use traits::{AccountStore, AuditStore, Backend, DocumentStore, StorageError};
