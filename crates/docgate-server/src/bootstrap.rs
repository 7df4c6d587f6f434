use std::collections::BTreeMap;

use docgate_core::PermissionSet;
use docgate_storage::{Account, AccountStore, Backend, StorageError};

use crate::auth;
use crate::config::{ADMIN_POLICY, BootstrapAdmin};
use crate::error::GatewayError;
use crate::operations::require_assignable_user_id;

/// Creates the configured admin account unless one already exists under that id.
/// Returns whether an account was created.
pub async fn ensure_admin<B: Backend>(
    backend: &B,
    admin: &BootstrapAdmin,
) -> Result<bool, GatewayError> {
    require_assignable_user_id(&admin.user_id)?;
    if backend.accounts().get(&admin.user_id).await?.is_some() {
        return Ok(false);
    }

    let account = Account {
        user_id: admin.user_id.clone(),
        api_key_hash: auth::hash_secret(&admin.api_key)?,
        policy: ADMIN_POLICY.to_string(),
        permissions: PermissionSet::full(),
        user_management: true,
        metadata: BTreeMap::new(),
    };
    match backend.accounts().create(&account).await {
        Ok(()) => Ok(true),
        // another instance won the race
        Err(StorageError::DuplicateKey(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use docgate_storage::InMemoryBackend;

    use super::*;

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            user_id: "root".to_string(),
            api_key: "bootstrap-key".to_string(),
        }
    }

    #[tokio::test]
    async fn creates_admin_once() {
        let backend = InMemoryBackend::new();

        assert!(ensure_admin(&backend, &admin()).await.unwrap());
        assert!(!ensure_admin(&backend, &admin()).await.unwrap());

        let account = backend.accounts().get("root").await.unwrap().unwrap();
        assert_eq!(account.policy, ADMIN_POLICY);
        assert!(account.user_management);
        assert!(auth::verify_secret("bootstrap-key", &account.api_key_hash).unwrap());
    }

    #[tokio::test]
    async fn reserved_admin_id_is_rejected() {
        let backend = InMemoryBackend::new();
        let admin = BootstrapAdmin {
            user_id: "anonymous".to_string(),
            api_key: "bootstrap-key".to_string(),
        };

        let err = ensure_admin(&backend, &admin).await.unwrap_err();

        assert_eq!(err.kind(), "ValidationFailure");
        assert!(backend.accounts().get("anonymous").await.unwrap().is_none());
    }
}
