use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use docgate_core::context::ACTION_KEY;
use docgate_core::{Grant, Identity, PermissionSet, RequestContext};
use docgate_storage::{Account, AccountStore, AccountUpdate, Backend, StorageError};

use super::{Body, parse_body};
use crate::auth::{self, AuthError};
use crate::config::ADMIN_POLICY;
use crate::envelope::Operation;
use crate::error::GatewayError;
use crate::gate;
use crate::identity::TokenIssuer;

const TARGET_USER_KEY: &str = "target_user";
const USERNAME_KEY: &str = "username";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub role: String,
    pub metadata: BTreeMap<String, String>,
    pub permissions: PermissionSet,
    pub user_management: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAccount {
    pub message: String,
    pub user_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateAccountRequest {
    user_id: String,
    policy: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    department: String,
    #[serde(default)]
    read: Option<Grant>,
    #[serde(default)]
    write: Option<Grant>,
}

#[derive(Debug, Default, Deserialize)]
struct PermissionPatch {
    #[serde(default)]
    read: Option<Grant>,
    #[serde(default)]
    write: Option<Grant>,
}

#[derive(Debug, Deserialize)]
struct UpdateAccountRequest {
    #[serde(default)]
    policy: Option<String>,
    #[serde(default)]
    permissions: Option<PermissionPatch>,
}

/// Rejects ids that cannot name a real account. `anonymous` is the audit identity
/// of unauthenticated calls.
pub(crate) fn require_assignable_user_id(user_id: &str) -> Result<(), GatewayError> {
    if user_id.trim().is_empty() {
        return Err(GatewayError::validation("user_id must not be empty"));
    }
    if user_id == Identity::ANONYMOUS {
        return Err(GatewayError::validation(format!(
            "User id '{user_id}' is reserved."
        )));
    }
    Ok(())
}

fn require_known_policy(policies: &[String], policy: &str) -> Result<(), GatewayError> {
    if policies.iter().any(|p| p == policy) {
        Ok(())
    } else {
        Err(GatewayError::validation(format!("Policy '{policy}' not found.")))
    }
}

/// Exchanges a user id and API key for a signed access token.
pub struct IssueToken {
    pub username: String,
    pub api_key: String,
    pub issuer: Arc<TokenIssuer>,
}

impl<B: Backend> Operation<B> for IssueToken {
    type Output = TokenResponse;

    async fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> Result<TokenResponse, GatewayError> {
        ctx.annotate(ACTION_KEY, "issue_token");
        ctx.annotate(USERNAME_KEY, self.username.as_str());

        let account = backend.accounts().get(&self.username).await?;
        let identity = auth::authenticate_api_key(&self.username, &self.api_key, account)?;
        let access_token = self.issuer.issue(&identity)?;

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        })
    }
}

/// Returns the caller's own profile.
pub struct WhoAmI;

impl<B: Backend> Operation<B> for WhoAmI {
    type Output = Profile;

    async fn execute(self, ctx: &mut RequestContext, _backend: &B) -> Result<Profile, GatewayError> {
        ctx.annotate(ACTION_KEY, "whoami");
        let identity = ctx.identity();
        if identity.is_anonymous() {
            return Err(AuthError::MissingCredential.into());
        }
        Ok(Profile {
            user_id: identity.user_id.clone(),
            role: identity.policy.clone(),
            metadata: identity.metadata.clone(),
            permissions: identity.permissions.clone(),
            user_management: identity.user_management,
        })
    }
}

pub struct CreateAccount {
    pub body: Body,
    pub policies: Arc<[String]>,
}

impl<B: Backend> Operation<B> for CreateAccount {
    type Output = CreatedAccount;
    const SUCCESS_STATUS: u16 = 201;

    async fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> Result<CreatedAccount, GatewayError> {
        gate::authorize_management(ctx, "create_user")?;
        let request: CreateAccountRequest = parse_body(self.body)?;
        ctx.annotate(TARGET_USER_KEY, request.user_id.as_str());

        require_assignable_user_id(&request.user_id)?;
        require_known_policy(&self.policies, &request.policy)?;

        let (permissions, user_management) = if request.policy == ADMIN_POLICY {
            (PermissionSet::full(), true)
        } else {
            (
                PermissionSet::new(
                    request.read.unwrap_or_default(),
                    request.write.unwrap_or_default(),
                ),
                false,
            )
        };

        let metadata = [("name", request.name), ("department", request.department)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        let api_key = auth::generate_api_key();
        let account = Account {
            user_id: request.user_id.clone(),
            api_key_hash: auth::hash_secret(&api_key)?,
            policy: request.policy,
            permissions,
            user_management,
            metadata,
        };
        backend.accounts().create(&account).await?;

        Ok(CreatedAccount {
            message: "User created successfully. Store this API key securely; it will not be shown again."
                .to_string(),
            user_id: request.user_id,
            api_key,
        })
    }
}

pub struct UpdateAccount {
    pub user_id: String,
    pub body: Body,
    pub policies: Arc<[String]>,
}

impl<B: Backend> Operation<B> for UpdateAccount {
    type Output = StatusMessage;

    async fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> Result<StatusMessage, GatewayError> {
        gate::authorize_management(ctx, "update_user")?;
        ctx.annotate(TARGET_USER_KEY, self.user_id.as_str());
        let request: UpdateAccountRequest = parse_body(self.body)?;

        let existing = backend.accounts().get(&self.user_id).await?.ok_or_else(|| {
            StorageError::DocumentNotFound(format!("User '{}' not found for update.", self.user_id))
        })?;

        let mut update = AccountUpdate::default();
        if let Some(policy) = request.policy
            && policy != existing.policy
        {
            require_known_policy(&self.policies, &policy)?;
            if policy == ADMIN_POLICY {
                update.read = Some(Grant::All);
                update.write = Some(Grant::All);
                update.user_management = Some(true);
            } else if existing.policy == ADMIN_POLICY {
                update.user_management = Some(false);
            }
            update.policy = Some(policy);
        }
        if let Some(patch) = request.permissions {
            if patch.read.is_some() {
                update.read = patch.read;
            }
            if patch.write.is_some() {
                update.write = patch.write;
            }
        }

        if update.is_empty() {
            return Ok(StatusMessage::ok("No changes detected."));
        }
        backend.accounts().update(&self.user_id, &update).await?;

        Ok(StatusMessage::ok(format!(
            "User '{}' updated successfully.",
            self.user_id
        )))
    }
}

pub struct DeleteAccount {
    pub user_id: String,
}

impl<B: Backend> Operation<B> for DeleteAccount {
    type Output = StatusMessage;

    async fn execute(
        self,
        ctx: &mut RequestContext,
        backend: &B,
    ) -> Result<StatusMessage, GatewayError> {
        gate::authorize_management(ctx, "delete_user")?;
        ctx.annotate(TARGET_USER_KEY, self.user_id.as_str());

        if ctx.identity().user_id == self.user_id {
            return Err(GatewayError::validation("Admins cannot delete themselves."));
        }
        backend.accounts().delete(&self.user_id).await?;

        Ok(StatusMessage::ok(format!(
            "User '{}' deleted successfully.",
            self.user_id
        )))
    }
}
