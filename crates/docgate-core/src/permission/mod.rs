mod evaluate;

pub use evaluate::{Decision, DenyReason, evaluate, evaluate_action};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::action::PermissionClass;

/// Access granted for one permission class. Exactly one variant applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrantRepr", into = "GrantRepr")]
pub enum Grant {
    All,
    #[default]
    None,
    Scoped(BTreeMap<String, BTreeSet<String>>),
}

impl Grant {
    /// Builds a scoped grant, dropping databases with no collections.
    pub fn scoped<D, C, I>(entries: impl IntoIterator<Item = (D, I)>) -> Self
    where
        D: Into<String>,
        C: Into<String>,
        I: IntoIterator<Item = C>,
    {
        let mapping: BTreeMap<String, BTreeSet<String>> = entries
            .into_iter()
            .map(|(db, colls)| (db.into(), colls.into_iter().map(|c| c.into()).collect()))
            .collect();
        Grant::Scoped(normalize(mapping))
    }

    pub fn covers(&self, db: &str, collection: &str) -> bool {
        match self {
            Grant::All => true,
            Grant::None => false,
            Grant::Scoped(mapping) => mapping
                .get(db)
                .is_some_and(|collections| collections.contains(collection)),
        }
    }
}

fn normalize(
    mapping: BTreeMap<String, BTreeSet<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    mapping
        .into_iter()
        .filter(|(_, collections)| !collections.is_empty())
        .collect()
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GrantRepr {
    Keyword(String),
    Scoped(BTreeMap<String, BTreeSet<String>>),
}

impl TryFrom<GrantRepr> for Grant {
    type Error = String;

    fn try_from(repr: GrantRepr) -> Result<Self, Self::Error> {
        match repr {
            GrantRepr::Keyword(word) => match word.as_str() {
                "all" => Ok(Grant::All),
                "none" => Ok(Grant::None),
                other => Err(format!(
                    "invalid grant '{other}': expected \"all\", \"none\" or a database mapping"
                )),
            },
            GrantRepr::Scoped(mapping) => Ok(Grant::Scoped(normalize(mapping))),
        }
    }
}

impl From<Grant> for GrantRepr {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::All => GrantRepr::Keyword("all".to_string()),
            Grant::None => GrantRepr::Keyword("none".to_string()),
            Grant::Scoped(mapping) => GrantRepr::Scoped(mapping),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub read: Grant,
    #[serde(default)]
    pub write: Grant,
}

impl PermissionSet {
    pub fn new(read: Grant, write: Grant) -> Self {
        Self { read, write }
    }

    pub fn full() -> Self {
        Self::new(Grant::All, Grant::All)
    }

    pub fn grant_for(&self, class: PermissionClass) -> Option<&Grant> {
        match class {
            PermissionClass::Read => Some(&self.read),
            PermissionClass::Write => Some(&self.write),
            PermissionClass::Management => None,
        }
    }
}

/// The caller as resolved from its token. Immutable for the lifetime of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub policy: String,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub user_management: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Identity {
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(
        user_id: impl Into<String>,
        policy: impl Into<String>,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            policy: policy.into(),
            permissions,
            user_management: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Self::ANONYMOUS, Self::ANONYMOUS, PermissionSet::default())
    }

    pub fn with_user_management(mut self, enabled: bool) -> Self {
        self.user_management = enabled;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == Self::ANONYMOUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grant_keywords_deserialize() {
        assert_eq!(serde_json::from_value::<Grant>(json!("all")).unwrap(), Grant::All);
        assert_eq!(serde_json::from_value::<Grant>(json!("none")).unwrap(), Grant::None);
    }

    #[test]
    fn unknown_grant_keyword_is_rejected() {
        let err = serde_json::from_value::<Grant>(json!("some")).unwrap_err();
        assert!(err.to_string().contains("invalid grant"), "got: {err}");
    }

    #[test]
    fn scoped_grant_deserializes_from_mapping() {
        let grant: Grant = serde_json::from_value(json!({"NSE_DATA": ["options", "equities"]}))
            .unwrap();

        assert!(grant.covers("NSE_DATA", "options"));
        assert!(grant.covers("NSE_DATA", "equities"));
        assert!(!grant.covers("NSE_DATA", "futures"));
    }

    #[test]
    fn empty_collection_list_is_treated_as_absent_database() {
        let grant: Grant =
            serde_json::from_value(json!({"a": [], "b": ["x"]})).unwrap();

        assert_eq!(grant, Grant::scoped([("b", ["x"])]));
    }

    #[test]
    fn scoped_constructor_drops_empty_sets() {
        let grant = Grant::scoped([("a", Vec::<&str>::new())]);
        assert_eq!(grant, Grant::Scoped(BTreeMap::new()));
    }

    #[test]
    fn grant_serializes_to_wire_form() {
        assert_eq!(serde_json::to_value(Grant::All).unwrap(), json!("all"));
        assert_eq!(serde_json::to_value(Grant::None).unwrap(), json!("none"));
        assert_eq!(
            serde_json::to_value(Grant::scoped([("db", ["c1"])])).unwrap(),
            json!({"db": ["c1"]})
        );
    }

    #[test]
    fn missing_permission_fields_default_to_none() {
        let set: PermissionSet = serde_json::from_value(json!({"read": "all"})).unwrap();

        assert_eq!(set.read, Grant::All);
        assert_eq!(set.write, Grant::None);
    }

    #[test]
    fn covers_is_case_sensitive() {
        let grant = Grant::scoped([("Prod", ["Users"])]);

        assert!(grant.covers("Prod", "Users"));
        assert!(!grant.covers("prod", "Users"));
        assert!(!grant.covers("Prod", "users"));
    }

    #[test]
    fn management_class_has_no_grant() {
        let set = PermissionSet::full();
        assert!(set.grant_for(PermissionClass::Management).is_none());
        assert_eq!(set.grant_for(PermissionClass::Read), Some(&Grant::All));
    }

    #[test]
    fn anonymous_identity_has_nothing() {
        let identity = Identity::anonymous();

        assert!(identity.is_anonymous());
        assert_eq!(identity.policy, "anonymous");
        assert_eq!(identity.permissions, PermissionSet::default());
        assert!(!identity.user_management);
    }

    #[test]
    fn identity_deserializes_without_optional_fields() {
        let identity: Identity = serde_json::from_value(json!({
            "user_id": "sir",
            "policy": "dev",
            "permissions": {"read": {"NSE_DATA": ["options"]}, "write": "none"}
        }))
        .unwrap();

        assert_eq!(identity.user_id, "sir");
        assert!(!identity.user_management);
        assert!(identity.metadata.is_empty());
        assert!(identity.permissions.read.covers("NSE_DATA", "options"));
    }
}
