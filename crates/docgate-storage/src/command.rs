use std::fmt;

use docgate_core::Action;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub db: String,
    pub collection: String,
}

impl Target {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Arguments for `find`. Sort keys are `(field, 1 | -1)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub filter: Document,
    #[serde(default)]
    pub projection: Option<Document>,
    #[serde(default)]
    pub sort: Vec<(String, i32)>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FindOne {
        filter: Document,
        projection: Option<Document>,
    },
    Find(FindOptions),
    Count {
        filter: Document,
    },
    InsertOne {
        document: Document,
    },
    InsertMany {
        documents: Vec<Document>,
    },
    UpdateOne {
        filter: Document,
        update: Document,
    },
    UpdateMany {
        filter: Document,
        update: Document,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl Command {
    pub fn action(&self) -> Action {
        match self {
            Command::FindOne { .. } => Action::FindOne,
            Command::Find(_) => Action::Find,
            Command::Count { .. } => Action::Count,
            Command::InsertOne { .. } => Action::InsertOne,
            Command::InsertMany { .. } => Action::InsertMany,
            Command::UpdateOne { .. } => Action::UpdateOne,
            Command::UpdateMany { .. } => Action::UpdateMany,
            Command::DeleteOne { .. } => Action::DeleteOne,
            Command::DeleteMany { .. } => Action::DeleteMany,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Document(Document),
    Documents(Vec<Document>),
    Count(u64),
    Inserted(Vec<String>),
}

impl CommandResult {
    /// JSON body returned to the caller.
    pub fn into_json(self) -> Value {
        match self {
            CommandResult::Document(doc) => Value::Object(doc),
            CommandResult::Documents(docs) => {
                Value::Array(docs.into_iter().map(Value::Object).collect())
            }
            CommandResult::Count(n) => serde_json::json!({ "count": n }),
            CommandResult::Inserted(ids) => serde_json::json!({ "inserted_ids": ids }),
        }
    }
}
