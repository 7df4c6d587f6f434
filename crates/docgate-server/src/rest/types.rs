use serde::{Deserialize, Serialize};

/// OAuth2 password-grant form; `password` carries the API key.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenForm {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
