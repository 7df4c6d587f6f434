use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form, Json};
use serde::Serialize;
use serde_json::{Value, json};

use docgate_core::RequestInfo;
use docgate_storage::Backend;

use crate::auth::Credential;
use crate::envelope::Operation;
use crate::operations::{
    Body, CreateAccount, DataOperation, DeleteAccount, IssueToken, Rejected, UpdateAccount, WhoAmI,
};
use crate::rate_limit::Limited;

use super::AppState;
use super::types::*;

fn request_info(method: &Method, uri: &Uri, payload: Option<Value>) -> RequestInfo {
    let request = RequestInfo::new(method.as_str(), uri.path());
    match payload {
        Some(payload) => request.with_payload(payload),
        None => request,
    }
}

fn credential_of(credential: Option<Extension<Credential>>) -> Credential {
    credential
        .map(|Extension(credential)| credential)
        .unwrap_or(Credential::Missing)
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> (Option<Value>, Body) {
    match body {
        Ok(Json(value)) => (Some(value.clone()), Ok(value)),
        Err(rejection) => (None, Err(rejection.body_text())),
    }
}

/// Runs `op` on its own task so a dropped connection cannot cut the audit short.
async fn dispatch<B, O>(
    state: &AppState<B>,
    request: RequestInfo,
    credential: Option<Credential>,
    op: O,
) -> Response
where
    B: Backend,
    O: Operation<B>,
    O::Output: Serialize,
{
    let status = StatusCode::from_u16(O::SUCCESS_STATUS).unwrap_or(StatusCode::OK);
    match Arc::clone(&state.envelope)
        .run_detached(request, credential, op)
        .await
    {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn data_operation<B: Backend>(
    State(state): State<AppState<B>>,
    Path(action): Path<String>,
    method: Method,
    uri: Uri,
    credential: Option<Extension<Credential>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (payload, body) = json_body(body);
    let request = request_info(&method, &uri, payload);
    let op = DataOperation::new(action, body);
    dispatch(&state, request, Some(credential_of(credential)), op).await
}

pub async fn issue_token<B: Backend>(
    State(state): State<AppState<B>>,
    method: Method,
    uri: Uri,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Response {
    match form {
        Ok(Form(form)) => {
            let request = request_info(&method, &uri, Some(json!({"username": form.username})));
            let op = IssueToken {
                username: form.username,
                api_key: form.password,
                issuer: state.issuer.clone(),
            };
            dispatch(&state, request, None, op).await
        }
        Err(rejection) => {
            let request = request_info(&method, &uri, None);
            let op = Rejected {
                reason: rejection.body_text(),
            };
            dispatch(&state, request, None, op).await
        }
    }
}

pub async fn whoami<B: Backend>(
    State(state): State<AppState<B>>,
    method: Method,
    uri: Uri,
    credential: Option<Extension<Credential>>,
) -> Response {
    let request = request_info(&method, &uri, None);
    let op = Limited::new(WhoAmI, state.limiter.clone());
    dispatch(&state, request, Some(credential_of(credential)), op).await
}

pub async fn create_user<B: Backend>(
    State(state): State<AppState<B>>,
    method: Method,
    uri: Uri,
    credential: Option<Extension<Credential>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (payload, body) = json_body(body);
    let request = request_info(&method, &uri, payload);
    let op = CreateAccount {
        body,
        policies: state.policies.clone(),
    };
    let op = Limited::new(op, state.limiter.clone());
    dispatch(&state, request, Some(credential_of(credential)), op).await
}

pub async fn update_user<B: Backend>(
    State(state): State<AppState<B>>,
    Path(user_id): Path<String>,
    method: Method,
    uri: Uri,
    credential: Option<Extension<Credential>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let (payload, body) = json_body(body);
    let request = request_info(&method, &uri, payload);
    let op = UpdateAccount {
        user_id,
        body,
        policies: state.policies.clone(),
    };
    let op = Limited::new(op, state.limiter.clone());
    dispatch(&state, request, Some(credential_of(credential)), op).await
}

pub async fn delete_user<B: Backend>(
    State(state): State<AppState<B>>,
    Path(user_id): Path<String>,
    method: Method,
    uri: Uri,
    credential: Option<Extension<Credential>>,
) -> Response {
    let request = request_info(&method, &uri, None);
    let op = Limited::new(DeleteAccount { user_id }, state.limiter.clone());
    dispatch(&state, request, Some(credential_of(credential)), op).await
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
