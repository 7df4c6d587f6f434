use std::collections::BTreeMap;

use serde_json::Value;

use crate::permission::Identity;

pub const ACTION_KEY: &str = "action";
pub const DB_KEY: &str = "db";
pub const COLLECTION_KEY: &str = "collection";

/// Per-call carrier that threads identity and annotations from authentication to
/// the audit record. Owned by exactly one call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    identity: Identity,
    annotations: BTreeMap<String, Value>,
}

impl RequestContext {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            annotations: BTreeMap::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }

    pub fn action(&self) -> Option<&str> {
        self.annotation(ACTION_KEY).and_then(Value::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<String, Value> {
        &self.annotations
    }

    pub fn into_snapshot(self) -> ContextSnapshot {
        ContextSnapshot {
            identity: self.identity,
            annotations: self.annotations,
        }
    }
}

/// Read-only view of a finished call's context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub identity: Identity,
    pub annotations: BTreeMap<String, Value>,
}

impl ContextSnapshot {
    pub fn action(&self) -> Option<&str> {
        self.annotations.get(ACTION_KEY).and_then(Value::as_str)
    }
}
