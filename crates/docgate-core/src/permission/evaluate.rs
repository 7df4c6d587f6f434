use crate::action::{Action, PermissionClass};

use super::{Grant, Identity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("missing user_management permission")]
    MissingManagement,

    #[error("no {0} permission")]
    NoGrant(PermissionClass),

    #[error("user not authorized for '{class}' on '{db}.{collection}'.")]
    OutOfScope {
        class: PermissionClass,
        db: String,
        collection: String,
    },

    #[error("unknown action")]
    UnknownAction,
}

/// Decides whether `identity` may run the named action against `db.collection`.
///
/// Names that do not parse as an [`Action`] are denied.
pub fn evaluate(identity: &Identity, action: &str, db: &str, collection: &str) -> Decision {
    match action.parse::<Action>() {
        Ok(action) => evaluate_action(identity, action, db, collection),
        Err(_) => Decision::Deny(DenyReason::UnknownAction),
    }
}

pub fn evaluate_action(
    identity: &Identity,
    action: Action,
    db: &str,
    collection: &str,
) -> Decision {
    let class = action.required_class();

    let grant = match class {
        PermissionClass::Management => {
            return if identity.user_management {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::MissingManagement)
            };
        }
        PermissionClass::Read => &identity.permissions.read,
        PermissionClass::Write => &identity.permissions.write,
    };

    match grant {
        Grant::All => Decision::Allow,
        Grant::None => Decision::Deny(DenyReason::NoGrant(class)),
        Grant::Scoped(_) if grant.covers(db, collection) => Decision::Allow,
        Grant::Scoped(_) => Decision::Deny(DenyReason::OutOfScope {
            class,
            db: db.to_string(),
            collection: collection.to_string(),
        }),
    }
}
