use std::collections::BTreeMap;

use docgate_core::{Grant, Identity, PermissionSet};
use serde::{Deserialize, Serialize};

/// A stored gateway account. The API key is kept only as an argon2 hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub api_key_hash: String,
    pub policy: String,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub user_management: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Account {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            policy: self.policy.clone(),
            permissions: self.permissions.clone(),
            user_management: self.user_management,
            metadata: self.metadata.clone(),
        }
    }

    pub fn apply(&mut self, update: &AccountUpdate) {
        if let Some(policy) = &update.policy {
            self.policy = policy.clone();
        }
        if let Some(read) = &update.read {
            self.permissions.read = read.clone();
        }
        if let Some(write) = &update.write {
            self.permissions.write = write.clone();
        }
        if let Some(flag) = update.user_management {
            self.user_management = flag;
        }
    }
}

/// Partial account modification; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub read: Option<Grant>,
    #[serde(default)]
    pub write: Option<Grant>,
    #[serde(default)]
    pub user_management: Option<bool>,
}

impl AccountUpdate {
    pub fn is_empty(&self) -> bool {
        self.policy.is_none()
            && self.read.is_none()
            && self.write.is_none()
            && self.user_management.is_none()
    }
}
