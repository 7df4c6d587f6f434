use docgate_core::context::{ACTION_KEY, COLLECTION_KEY, DB_KEY};
use docgate_core::{Action, Decision, DenyReason, RequestContext, evaluate, evaluate_action};

use crate::error::GatewayError;

const OPERATION_KEY: &str = "operation";

/// Annotates the call with its action and target, then evaluates the caller's
/// grants. Must run before the storage capability is touched.
pub fn authorize(
    ctx: &mut RequestContext,
    action: &str,
    db: &str,
    collection: &str,
) -> Result<(), GatewayError> {
    ctx.annotate(ACTION_KEY, action);
    ctx.annotate(DB_KEY, db);
    ctx.annotate(COLLECTION_KEY, collection);

    if db.is_empty() || collection.is_empty() {
        return Err(GatewayError::validation(
            "database and collection names must not be empty",
        ));
    }

    into_result(evaluate(ctx.identity(), action, db, collection))
}

/// Gate for account CRUD. `operation` names the account call for the audit trail.
pub fn authorize_management(ctx: &mut RequestContext, operation: &str) -> Result<(), GatewayError> {
    ctx.annotate(ACTION_KEY, Action::UserManagement.as_str());
    ctx.annotate(OPERATION_KEY, operation);

    into_result(evaluate_action(ctx.identity(), Action::UserManagement, "", ""))
}

fn into_result(decision: Decision) -> Result<(), GatewayError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(DenyReason::UnknownAction) => {
            Err(GatewayError::validation(DenyReason::UnknownAction.to_string()))
        }
        Decision::Deny(reason) => Err(GatewayError::Authorization(reason)),
    }
}
