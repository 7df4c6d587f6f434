use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;

use docgate_core::Identity;
use docgate_storage::Account;

const API_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingCredential,

    #[error("invalid authorization header")]
    MalformedCredential,

    #[error("Token has expired.")]
    Expired,

    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("API key was not provided.")]
    MissingApiKey,

    #[error("User '{0}' not found.")]
    UnknownUser(String),

    #[error("Invalid API key provided.")]
    InvalidApiKey,

    #[error("internal authentication error: {0}")]
    Internal(String),
}

/// Bearer credential as found on an inbound call, before any verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Missing,
    Malformed,
    Bearer(String),
}

impl Credential {
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Credential::Missing;
        };
        match value.split_once(' ') {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
            {
                Credential::Bearer(token.trim().to_string())
            }
            _ => Credential::Malformed,
        }
    }
}

pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_api_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..API_KEY_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}

/// Checks an API key against the stored account and yields the account's identity.
pub fn authenticate_api_key(
    user_id: &str,
    api_key: &str,
    account: Option<Account>,
) -> Result<Identity, AuthError> {
    if api_key.is_empty() {
        return Err(AuthError::MissingApiKey);
    }
    let account = account.ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;
    if !verify_secret(api_key, &account.api_key_hash)? {
        return Err(AuthError::InvalidApiKey);
    }
    Ok(account.identity())
}
