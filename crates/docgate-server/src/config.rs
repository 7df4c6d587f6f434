use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub accounts: AccountsConfig,
    pub audit: AuditConfig,
    pub rate_limit: RateLimitConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_secs: u64,
    pub token_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub policies: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub user_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Upper bound on one audit append; a slower sink is treated as a failed append.
    pub persist_timeout_ms: u64,
}

/// Per-user request quotas on the account routes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_minute: u32,
    pub per_day: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

pub const ADMIN_POLICY: &str = "admin";

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/docgate".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: 2 * 60 * 60,
            token_path: "/api/auth/token".to_string(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            policies: vec![
                ADMIN_POLICY.to_string(),
                "analyst".to_string(),
                "reader".to_string(),
            ],
            bootstrap_admin: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            persist_timeout_ms: 2_000,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_minute: 100,
            per_day: 1_000_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOCGATE_HTTP_HOST") {
            self.http.host = v;
        }
        if let Ok(v) = std::env::var("DOCGATE_HTTP_PORT")
            && let Ok(port) = v.parse()
        {
            self.http.port = port;
        }
        if let Ok(v) = std::env::var("DOCGATE_DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = std::env::var("DOCGATE_DATABASE_MAX_CONNECTIONS")
            && let Ok(n) = v.parse()
        {
            self.database.max_connections = n;
        }
        if let Ok(v) = std::env::var("DOCGATE_STORAGE_BACKEND") {
            match v.as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "postgres" => self.storage.backend = StorageBackend::Postgres,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("DOCGATE_AUTH_SECRET") {
            self.auth.secret = v;
        }
        if let Ok(v) = std::env::var("DOCGATE_AUTH_TOKEN_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.auth.token_ttl_secs = n;
        }
        if let Ok(v) = std::env::var("DOCGATE_AUDIT_PERSIST_TIMEOUT_MS")
            && let Ok(n) = v.parse()
        {
            self.audit.persist_timeout_ms = n;
        }
        if let Ok(v) = std::env::var("DOCGATE_RATE_LIMIT_ENABLED")
            && let Ok(flag) = v.parse()
        {
            self.rate_limit.enabled = flag;
        }
        if let Ok(v) = std::env::var("DOCGATE_RATE_LIMIT_PER_MINUTE")
            && let Ok(n) = v.parse()
        {
            self.rate_limit.per_minute = n;
        }
        if let Ok(v) = std::env::var("DOCGATE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("DOCGATE_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.auth.secret.len() < 32 {
            return Err(ConfigError::Validation(
                "auth.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.token_ttl_secs must be non-zero".to_string(),
            ));
        }
        if !self.auth.token_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "auth.token_path must start with '/'".to_string(),
            ));
        }
        if !self.accounts.policies.iter().any(|p| p == ADMIN_POLICY) {
            return Err(ConfigError::Validation(format!(
                "accounts.policies must include '{ADMIN_POLICY}'"
            )));
        }
        if self.audit.persist_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "audit.persist_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.rate_limit.enabled && (self.rate_limit.per_minute == 0 || self.rate_limit.per_day == 0)
        {
            return Err(ConfigError::Validation(
                "rate_limit.per_minute and rate_limit.per_day must be non-zero when enabled"
                    .to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres && self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    pub fn audit_persist_timeout(&self) -> Duration {
        Duration::from_millis(self.audit.persist_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.secret = SECRET.to_string();
        config
    }

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();

        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.token_ttl_secs, 7200);
        assert_eq!(config.auth.token_path, "/api/auth/token");
        assert!(config.accounts.policies.iter().any(|p| p == ADMIN_POLICY));
        assert_eq!(config.audit_persist_timeout(), Duration::from_secs(2));
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.per_minute, 100);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
host = "127.0.0.1"
port = 9090

[storage]
backend = "postgres"

[auth]
secret = "{SECRET}"
token_ttl_secs = 600

[accounts]
policies = ["admin", "auditor"]

[rate_limit]
enabled = false
per_minute = 5

[accounts.bootstrap_admin]
user_id = "root"
api_key = "root-key"

[log]
format = "pretty"
level = "debug"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.http_addr(), "127.0.0.1:9090");
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.accounts.policies, vec!["admin", "auditor"]);
        assert_eq!(config.rate_limit.per_minute, 5);
        assert!(!config.rate_limit.enabled);
        assert_eq!(
            config.accounts.bootstrap_admin,
            Some(BootstrapAdmin {
                user_id: "root".to_string(),
                api_key: "root-key".to_string(),
            })
        );
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn env_vars_override_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
port = 9090

[auth]
secret = "{SECRET}"
"#
        )
        .unwrap();

        // SAFETY: test runs single-threaded for this env var
        unsafe { std::env::set_var("DOCGATE_HTTP_PORT", "8181") };
        let config = AppConfig::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("DOCGATE_HTTP_PORT") };

        assert_eq!(config.http.port, 8181);
    }

    #[test]
    fn validation_rejects_short_secret() {
        let config = AppConfig::default();

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("secret")));
    }

    #[test]
    fn validation_rejects_zero_port() {
        let mut config = valid();
        config.http.port = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("port")));
    }

    #[test]
    fn validation_requires_admin_policy() {
        let mut config = valid();
        config.accounts.policies = vec!["reader".to_string()];

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("admin")));
    }

    #[test]
    fn validation_rejects_relative_token_path() {
        let mut config = valid();
        config.auth.token_path = "api/auth/token".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_rate_limit_when_enabled() {
        let mut config = valid();
        config.rate_limit.per_minute = 0;
        assert!(
            matches!(config.validate(), Err(ConfigError::Validation(ref msg)) if msg.contains("rate_limit"))
        );

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_zero_audit_timeout() {
        let mut config = valid();
        config.audit.persist_timeout_ms = 0;

        assert!(config.validate().is_err());
    }
}
