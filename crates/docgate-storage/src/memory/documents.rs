use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::command::{Command, CommandResult, Document, FindOptions, Target};
use crate::traits::{DocumentStore, StorageError};

const ID_FIELD: &str = "_id";

/// Collections held in process memory, keyed by `db.collection`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<Mutex<HashMap<Target, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn execute(
        &self,
        target: &Target,
        command: Command,
    ) -> Result<CommandResult, StorageError> {
        if target.db.is_empty() || target.collection.is_empty() {
            return Err(StorageError::InvalidCommand(
                "database and collection names must not be empty".to_string(),
            ));
        }

        let mut collections = self.collections.lock().unwrap();

        match command {
            Command::FindOne { filter, projection } => {
                validate_filter(&filter)?;
                let found = stored(&collections, target)
                    .iter()
                    .find(|d| matches(d, &filter))
                    .ok_or_else(|| {
                        StorageError::DocumentNotFound(format!(
                            "Document not found in {target} with query {}",
                            Value::Object(filter.clone())
                        ))
                    })?;
                Ok(CommandResult::Document(project(found, projection.as_ref())))
            }
            Command::Find(options) => {
                find(stored(&collections, target), options).map(CommandResult::Documents)
            }
            Command::Count { filter } => {
                validate_filter(&filter)?;
                let count = stored(&collections, target)
                    .iter()
                    .filter(|d| matches(d, &filter))
                    .count();
                Ok(CommandResult::Count(count as u64))
            }
            Command::InsertOne { document } => {
                let docs = collections.entry(target.clone()).or_default();
                let ids = insert(docs, vec![document], target)?;
                Ok(CommandResult::Inserted(ids))
            }
            Command::InsertMany { documents } => {
                if documents.is_empty() {
                    return Err(StorageError::InvalidCommand(
                        "insert_many requires at least one document".to_string(),
                    ));
                }
                let docs = collections.entry(target.clone()).or_default();
                let ids = insert(docs, documents, target)?;
                Ok(CommandResult::Inserted(ids))
            }
            Command::UpdateOne { filter, update } => {
                validate_filter(&filter)?;
                validate_update(&update)?;
                let not_found = || {
                    StorageError::DocumentNotFound(format!(
                        "Document not found in {target} for update."
                    ))
                };
                let docs = collections.get_mut(target).ok_or_else(not_found)?;
                let idx = docs
                    .iter()
                    .position(|d| matches(d, &filter))
                    .ok_or_else(not_found)?;
                let doc = updated(&docs[idx], &update)?;
                docs[idx] = doc;
                Ok(CommandResult::Count(1))
            }
            Command::UpdateMany { filter, update } => {
                validate_filter(&filter)?;
                validate_update(&update)?;
                let Some(docs) = collections.get_mut(target) else {
                    return Ok(CommandResult::Count(0));
                };
                // all matches must update cleanly before any is stored
                let changes = docs
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| matches(d, &filter))
                    .map(|(idx, d)| updated(d, &update).map(|doc| (idx, doc)))
                    .collect::<Result<Vec<_>, _>>()?;
                let modified = changes.len() as u64;
                for (idx, doc) in changes {
                    docs[idx] = doc;
                }
                Ok(CommandResult::Count(modified))
            }
            Command::DeleteOne { filter } => {
                validate_filter(&filter)?;
                let not_found = || {
                    StorageError::DocumentNotFound(format!(
                        "Document not found in {target} for deletion."
                    ))
                };
                let docs = collections.get_mut(target).ok_or_else(not_found)?;
                let idx = docs
                    .iter()
                    .position(|d| matches(d, &filter))
                    .ok_or_else(not_found)?;
                docs.remove(idx);
                Ok(CommandResult::Count(1))
            }
            Command::DeleteMany { filter } => {
                validate_filter(&filter)?;
                let Some(docs) = collections.get_mut(target) else {
                    return Ok(CommandResult::Count(0));
                };
                let before = docs.len();
                docs.retain(|d| !matches(d, &filter));
                Ok(CommandResult::Count((before - docs.len()) as u64))
            }
        }
    }
}

fn stored<'a>(collections: &'a HashMap<Target, Vec<Document>>, target: &Target) -> &'a [Document] {
    collections.get(target).map(Vec::as_slice).unwrap_or(&[])
}

fn validate_filter(filter: &Document) -> Result<(), StorageError> {
    if let Some(key) = filter.keys().find(|k| k.starts_with('$')) {
        return Err(StorageError::InvalidCommand(format!(
            "unsupported query operator '{key}'"
        )));
    }
    Ok(())
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

fn find(docs: &[Document], options: FindOptions) -> Result<Vec<Document>, StorageError> {
    validate_filter(&options.filter)?;
    if let Some((field, dir)) = options.sort.iter().find(|(_, dir)| *dir != 1 && *dir != -1) {
        return Err(StorageError::InvalidCommand(format!(
            "invalid sort direction {dir} for '{field}'"
        )));
    }

    let mut selected: Vec<&Document> = docs.iter().filter(|d| matches(d, &options.filter)).collect();
    if !options.sort.is_empty() {
        selected.sort_by(|a, b| {
            options
                .sort
                .iter()
                .map(|(field, dir)| {
                    let ord = compare_values(a.get(field), b.get(field));
                    if *dir < 0 { ord.reverse() } else { ord }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let offset = options.offset.unwrap_or(0);
    let limit = options.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
    Ok(selected
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|d| project(d, options.projection.as_ref()))
        .collect())
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Null => false,
        _ => true,
    }
}

fn project(doc: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection.filter(|p| !p.is_empty()) else {
        return doc.clone();
    };

    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != ID_FIELD && truthy(flag));
    let keep_id = projection.get(ID_FIELD).is_none_or(truthy);

    if inclusive {
        doc.iter()
            .filter(|(field, _)| {
                if *field == ID_FIELD {
                    keep_id
                } else {
                    projection.get(*field).is_some_and(truthy)
                }
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        doc.iter()
            .filter(|(field, _)| projection.get(*field).is_none_or(truthy))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn insert(
    docs: &mut Vec<Document>,
    batch: Vec<Document>,
    target: &Target,
) -> Result<Vec<String>, StorageError> {
    let mut prepared = Vec::with_capacity(batch.len());
    let mut ids = Vec::with_capacity(batch.len());

    for mut doc in batch {
        let id = doc
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().simple().to_string()))
            .clone();
        let taken = docs.iter().chain(prepared.iter()).any(|d| d.get(ID_FIELD) == Some(&id));
        if taken {
            return Err(StorageError::DuplicateKey(format!(
                "_id {} already exists in {target}",
                id
            )));
        }
        ids.push(id_string(&id));
        prepared.push(doc);
    }

    docs.extend(prepared);
    Ok(ids)
}

fn validate_update(update: &Document) -> Result<(), StorageError> {
    if update.is_empty() {
        return Err(StorageError::InvalidCommand(
            "update document must not be empty".to_string(),
        ));
    }
    for (op, fields) in update {
        let Value::Object(fields) = fields else {
            return Err(StorageError::InvalidCommand(format!(
                "operator '{op}' expects an object"
            )));
        };
        match op.as_str() {
            "$set" | "$unset" => {}
            "$inc" => {
                if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_number()) {
                    return Err(StorageError::InvalidCommand(format!(
                        "$inc value for '{field}' must be numeric"
                    )));
                }
            }
            other if other.starts_with('$') => {
                return Err(StorageError::InvalidCommand(format!(
                    "unsupported update operator '{other}'"
                )));
            }
            _ => {
                return Err(StorageError::InvalidCommand(
                    "update document must only contain operators".to_string(),
                ));
            }
        }
        if fields.contains_key(ID_FIELD) {
            return Err(StorageError::InvalidCommand("_id is immutable".to_string()));
        }
    }
    Ok(())
}

/// Returns the updated copy; `doc` itself is left untouched on error.
fn updated(doc: &Document, update: &Document) -> Result<Document, StorageError> {
    let mut doc = doc.clone();
    for (op, fields) in update {
        let Value::Object(fields) = fields else {
            continue;
        };
        for (field, value) in fields {
            match op.as_str() {
                "$set" => {
                    doc.insert(field.clone(), value.clone());
                }
                "$unset" => {
                    doc.remove(field);
                }
                "$inc" => {
                    let current = doc.get(field).cloned().unwrap_or(Value::from(0));
                    doc.insert(field.clone(), increment(field, &current, value)?);
                }
                _ => {}
            }
        }
    }
    Ok(doc)
}

fn increment(field: &str, current: &Value, by: &Value) -> Result<Value, StorageError> {
    let non_numeric =
        || StorageError::InvalidCommand(format!("cannot apply $inc to non-numeric field '{field}'"));

    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        return a
            .checked_add(b)
            .map(Value::from)
            .ok_or_else(|| StorageError::InvalidCommand(format!("$inc overflow on '{field}'")));
    }
    let a = current.as_f64().ok_or_else(non_numeric)?;
    let b = by.as_f64().ok_or_else(non_numeric)?;
    Ok(Value::from(a + b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn orders() -> Target {
        Target::new("sales", "orders")
    }

    async fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store
            .execute(
                &orders(),
                Command::InsertMany {
                    documents: vec![
                        doc(json!({"_id": "a", "status": "open", "total": 30, "owner": "alice"})),
                        doc(json!({"_id": "b", "status": "closed", "total": 10, "owner": "bob"})),
                        doc(json!({"_id": "c", "status": "open", "total": 20, "owner": "carol"})),
                    ],
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn find_one_returns_first_match() {
        let store = seeded().await;

        let result = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"status": "open"})),
                    projection: None,
                },
            )
            .await
            .unwrap();

        let CommandResult::Document(found) = result else {
            panic!("expected document");
        };
        assert_eq!(found.get("_id"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn find_one_without_match_is_not_found() {
        let store = seeded().await;

        let err = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"status": "void"})),
                    projection: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "DocumentNotFound");
        assert!(err.to_string().contains("sales.orders"));
    }

    #[tokio::test]
    async fn find_sorts_offsets_and_limits() {
        let store = seeded().await;

        let result = store
            .execute(
                &orders(),
                Command::Find(FindOptions {
                    sort: vec![("total".to_string(), -1)],
                    offset: Some(1),
                    limit: Some(1),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let CommandResult::Documents(docs) = result else {
            panic!("expected documents");
        };
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("_id"), Some(&json!("c")));
    }

    #[tokio::test]
    async fn inclusion_projection_keeps_id_unless_excluded() {
        let store = seeded().await;

        let with_id = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"_id": "b"})),
                    projection: Some(doc(json!({"owner": 1}))),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            with_id,
            CommandResult::Document(doc(json!({"_id": "b", "owner": "bob"})))
        );

        let without_id = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"_id": "b"})),
                    projection: Some(doc(json!({"owner": 1, "_id": 0}))),
                },
            )
            .await
            .unwrap();
        assert_eq!(without_id, CommandResult::Document(doc(json!({"owner": "bob"}))));
    }

    #[tokio::test]
    async fn exclusion_projection_drops_listed_fields() {
        let store = seeded().await;

        let result = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"_id": "a"})),
                    projection: Some(doc(json!({"total": 0, "owner": 0}))),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            CommandResult::Document(doc(json!({"_id": "a", "status": "open"})))
        );
    }

    #[tokio::test]
    async fn insert_generates_id_and_rejects_duplicates() {
        let store = InMemoryDocumentStore::new();

        let result = store
            .execute(&orders(), Command::InsertOne { document: doc(json!({"x": 1})) })
            .await
            .unwrap();
        let CommandResult::Inserted(ids) = result else {
            panic!("expected inserted ids");
        };
        assert_eq!(ids.len(), 1);
        assert!(!ids[0].is_empty());

        let err = store
            .execute(
                &orders(),
                Command::InsertOne {
                    document: doc(json!({"_id": ids[0].clone()})),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateKey");
    }

    #[tokio::test]
    async fn insert_many_is_all_or_nothing() {
        let store = seeded().await;

        let err = store
            .execute(
                &orders(),
                Command::InsertMany {
                    documents: vec![doc(json!({"_id": "z"})), doc(json!({"_id": "a"}))],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateKey");

        let count = store
            .execute(&orders(), Command::Count { filter: Document::new() })
            .await
            .unwrap();
        assert_eq!(count, CommandResult::Count(3));
    }

    #[tokio::test]
    async fn update_operators_apply() {
        let store = seeded().await;

        store
            .execute(
                &orders(),
                Command::UpdateOne {
                    filter: doc(json!({"_id": "a"})),
                    update: doc(json!({
                        "$set": {"status": "shipped"},
                        "$unset": {"owner": ""},
                        "$inc": {"total": 5}
                    })),
                },
            )
            .await
            .unwrap();

        let found = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"_id": "a"})),
                    projection: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            found,
            CommandResult::Document(doc(json!({"_id": "a", "status": "shipped", "total": 35})))
        );
    }

    #[tokio::test]
    async fn update_without_operators_is_invalid() {
        let store = seeded().await;

        let err = store
            .execute(
                &orders(),
                Command::UpdateMany {
                    filter: Document::new(),
                    update: doc(json!({"status": "x"})),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InvalidCommand");
    }

    #[tokio::test]
    async fn update_many_and_delete_many_report_counts() {
        let store = seeded().await;

        let updated = store
            .execute(
                &orders(),
                Command::UpdateMany {
                    filter: doc(json!({"status": "open"})),
                    update: doc(json!({"$set": {"flag": true}})),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated, CommandResult::Count(2));

        let deleted = store
            .execute(
                &orders(),
                Command::DeleteMany {
                    filter: doc(json!({"flag": true})),
                },
            )
            .await
            .unwrap();
        assert_eq!(deleted, CommandResult::Count(2));
    }

    #[tokio::test]
    async fn delete_one_without_match_is_not_found() {
        let store = seeded().await;

        let err = store
            .execute(
                &orders(),
                Command::DeleteOne {
                    filter: doc(json!({"_id": "nope"})),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "DocumentNotFound");
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = seeded().await;

        let count = store
            .execute(
                &Target::new("sales", "invoices"),
                Command::Count { filter: Document::new() },
            )
            .await
            .unwrap();

        assert_eq!(count, CommandResult::Count(0));
    }

    #[tokio::test]
    async fn operator_filters_are_rejected() {
        let store = seeded().await;

        let err = store
            .execute(
                &orders(),
                Command::Count {
                    filter: doc(json!({"$where": "1"})),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InvalidCommand");
    }

    async fn fetch(store: &InMemoryDocumentStore, id: &str) -> Document {
        let result = store
            .execute(
                &orders(),
                Command::FindOne {
                    filter: doc(json!({"_id": id})),
                    projection: None,
                },
            )
            .await
            .unwrap();
        let CommandResult::Document(found) = result else {
            panic!("expected document");
        };
        found
    }

    #[tokio::test]
    async fn failed_update_many_leaves_every_document_unchanged() {
        let store = seeded().await;
        store
            .execute(
                &orders(),
                Command::UpdateOne {
                    filter: doc(json!({"_id": "c"})),
                    update: doc(json!({"$set": {"total": "twenty"}})),
                },
            )
            .await
            .unwrap();

        let err = store
            .execute(
                &orders(),
                Command::UpdateMany {
                    filter: doc(json!({"status": "open"})),
                    update: doc(json!({"$inc": {"total": 5}})),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InvalidCommand");
        assert_eq!(fetch(&store, "a").await.get("total"), Some(&json!(30)));
        assert_eq!(fetch(&store, "c").await.get("total"), Some(&json!("twenty")));
    }

    #[tokio::test]
    async fn failed_update_one_leaves_document_unchanged() {
        let store = seeded().await;
        store
            .execute(
                &orders(),
                Command::UpdateOne {
                    filter: doc(json!({"_id": "b"})),
                    update: doc(json!({"$set": {"owner": "bobby"}})),
                },
            )
            .await
            .unwrap();

        let err = store
            .execute(
                &orders(),
                Command::UpdateOne {
                    filter: doc(json!({"_id": "b"})),
                    update: doc(json!({"$inc": {"clicks": 1, "owner": 1}})),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InvalidCommand");
        let b = fetch(&store, "b").await;
        assert_eq!(b.get("clicks"), None);
        assert_eq!(b.get("owner"), Some(&json!("bobby")));
    }

    #[tokio::test]
    async fn reads_and_misses_do_not_create_collections() {
        let store = InMemoryDocumentStore::new();
        let ghost = Target::new("sales", "ghost");

        let count = store
            .execute(
                &ghost,
                Command::Count {
                    filter: Document::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(count, CommandResult::Count(0));

        let deleted = store
            .execute(
                &ghost,
                Command::DeleteMany {
                    filter: Document::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(deleted, CommandResult::Count(0));

        let err = store
            .execute(
                &ghost,
                Command::UpdateOne {
                    filter: Document::new(),
                    update: doc(json!({"$set": {"x": 1}})),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DocumentNotFound");

        assert!(store.collections.lock().unwrap().is_empty());
    }
}
