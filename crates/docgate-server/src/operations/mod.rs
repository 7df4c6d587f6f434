mod accounts;
mod data;

pub use accounts::{
    CreateAccount, CreatedAccount, DeleteAccount, IssueToken, Profile, StatusMessage,
    TokenResponse, UpdateAccount, WhoAmI,
};
pub(crate) use accounts::require_assignable_user_id;
pub use data::{DataOperation, DataRequest};

use serde::de::DeserializeOwned;
use serde_json::Value;

use docgate_core::RequestContext;
use docgate_storage::Backend;

use crate::envelope::Operation;
use crate::error::GatewayError;

/// Request body as received by the transport; `Err` carries the rejection text.
pub type Body = Result<Value, String>;

fn parse_body<T: DeserializeOwned>(body: Body) -> Result<T, GatewayError> {
    let value = body.map_err(GatewayError::Validation)?;
    serde_json::from_value(value)
        .map_err(|e| GatewayError::validation(format!("invalid request body: {e}")))
}

/// Stands in for an operation whose input the transport could not decode, so
/// the failure is still audited.
pub struct Rejected {
    pub reason: String,
}

impl<B: Backend> Operation<B> for Rejected {
    type Output = Value;

    async fn execute(self, _ctx: &mut RequestContext, _backend: &B) -> Result<Value, GatewayError> {
        Err(GatewayError::Validation(self.reason))
    }
}
