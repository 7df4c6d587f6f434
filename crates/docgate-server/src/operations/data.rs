use serde::{Deserialize, Serialize};
use serde_json::Value;

use docgate_core::context::ACTION_KEY;
use docgate_core::{Action, RequestContext};
use docgate_storage::{Backend, Command, CommandResult, Document, DocumentStore, FindOptions, Target};

use super::{Body, parse_body};
use crate::envelope::Operation;
use crate::error::GatewayError;
use crate::gate;

const RESULT_COUNT_KEY: &str = "result_count";

/// Body of every `/api/data/{action}` call. `query` doubles as the document for
/// `insert_one`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    pub db: String,
    pub collection: String,
    #[serde(default)]
    pub query: Document,
    #[serde(default)]
    pub projection: Option<Document>,
    #[serde(default)]
    pub sort: Vec<(String, i32)>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub update: Option<Document>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl DataRequest {
    fn into_command(self, action: Action) -> Result<Command, GatewayError> {
        let missing_update =
            || GatewayError::validation(format!("'update' is required for {action}"));

        Ok(match action {
            Action::FindOne => Command::FindOne {
                filter: self.query,
                projection: self.projection,
            },
            Action::Find => Command::Find(FindOptions {
                filter: self.query,
                projection: self.projection,
                sort: self.sort,
                limit: self.limit,
                offset: self.offset,
            }),
            Action::Count => Command::Count { filter: self.query },
            Action::InsertOne => Command::InsertOne {
                document: self.query,
            },
            Action::InsertMany => {
                if self.documents.is_empty() {
                    return Err(GatewayError::validation(
                        "'documents' must contain at least one document",
                    ));
                }
                Command::InsertMany {
                    documents: self.documents,
                }
            }
            Action::UpdateOne => Command::UpdateOne {
                filter: self.query,
                update: self.update.ok_or_else(missing_update)?,
            },
            Action::UpdateMany => Command::UpdateMany {
                filter: self.query,
                update: self.update.ok_or_else(missing_update)?,
            },
            Action::DeleteOne => Command::DeleteOne { filter: self.query },
            Action::DeleteMany => Command::DeleteMany { filter: self.query },
            Action::UserManagement => {
                return Err(GatewayError::validation(format!(
                    "{action} is not a data action"
                )));
            }
        })
    }
}

/// One document command named by the route's action segment.
pub struct DataOperation {
    action: String,
    body: Body,
}

impl DataOperation {
    pub fn new(action: impl Into<String>, body: Body) -> Self {
        Self {
            action: action.into(),
            body,
        }
    }
}

impl<B: Backend> Operation<B> for DataOperation {
    type Output = Value;

    async fn execute(self, ctx: &mut RequestContext, backend: &B) -> Result<Value, GatewayError> {
        ctx.annotate(ACTION_KEY, self.action.as_str());
        let request: DataRequest = parse_body(self.body)?;

        gate::authorize(ctx, &self.action, &request.db, &request.collection)?;

        let action: Action = self
            .action
            .parse()
            .map_err(|e: docgate_core::UnknownAction| GatewayError::validation(e.to_string()))?;
        let target = Target::new(&request.db, &request.collection);
        let command = request.into_command(action)?;

        let result = backend.documents().execute(&target, command).await?;
        match &result {
            CommandResult::Documents(docs) => ctx.annotate(RESULT_COUNT_KEY, docs.len()),
            CommandResult::Count(n) => ctx.annotate(RESULT_COUNT_KEY, *n),
            CommandResult::Inserted(ids) => ctx.annotate(RESULT_COUNT_KEY, ids.len()),
            CommandResult::Document(_) => ctx.annotate(RESULT_COUNT_KEY, 1),
        }

        Ok(result.into_json())
    }
}
