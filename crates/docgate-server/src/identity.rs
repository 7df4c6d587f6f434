use std::collections::BTreeMap;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use docgate_core::{Identity, PermissionSet};

use crate::auth::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub user_management: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_identity(identity: &Identity, issued_at: i64, ttl_secs: u64) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            role: identity.policy.clone(),
            metadata: identity.metadata.clone(),
            permissions: identity.permissions.clone(),
            user_management: identity.user_management,
            iat: issued_at,
            exp: issued_at.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    pub fn into_identity(self) -> Identity {
        Identity {
            user_id: self.user_id,
            policy: self.role,
            permissions: self.permissions,
            user_management: self.user_management,
            metadata: self.metadata,
        }
    }
}

/// Signs HS256 access tokens for authenticated accounts.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        let claims = Claims::for_identity(identity, Utc::now().timestamp(), self.ttl_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::Internal(format!("Failed to create JWT: {e}")))
    }
}

pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> impl Future<Output = Result<Identity, AuthError>> + Send;
}

pub struct JwtIdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.into_identity())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }
}
