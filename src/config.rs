//! Typed configuration (spec §4.11, component C11, ambient).
//!
//! [`Settings`] is assembled once from the environment table in §6 via a
//! layered config source (defaults → environment variables). A missing or
//! malformed individual value silently falls back to its default — only a
//! genuinely unusable combination (`STORAGE_BACKEND=postgres` with no DB
//! host) fails fast at startup, in [`Settings::validate`].

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_env_str(value: &str) -> Self {
        match value {
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn from_env_str(value: &str) -> Self {
        match value {
            "postgres" => StorageBackend::Postgres,
            _ => StorageBackend::Memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn from_env_str(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: Option<String>,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub sslmode: String,
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> Option<String> {
        let host = self.host.as_ref()?;
        Some(format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, host, self.port, self.name, self.sslmode
        ))
    }
}

#[derive(Debug, Clone)]
pub struct ProviderKeys {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub together_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub ollama_base_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub aws_region: Option<String>,
    pub vertex_project_id: Option<String>,
    pub vertex_location: Option<String>,
}

/// Immutable, process-wide configuration. Constructed once with
/// [`Settings::from_env`] and passed by `Arc` to every component that needs
/// it (ports, storage backend choice, log level/format, provider base URLs).
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub version: String,
    pub grpc_port: u16,
    pub http_port: u16,
    pub prompt_port: u16,
    pub deploy_port: u16,
    pub storage_backend: StorageBackend,
    pub database: DatabaseSettings,
    pub redis_url: Option<String>,
    pub observe_endpoint: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub tracing_enabled: bool,
    pub tracing_sampling: f64,
    pub providers: ProviderKeys,
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool_or(key: &str, default: bool) -> bool {
    match env_var(key).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

impl Settings {
    /// Loads configuration from the process environment, falling back to
    /// documented defaults for every missing or malformed key. Never fails
    /// on an individual key — call [`Settings::validate`] afterward to
    /// surface genuinely unusable combinations.
    pub fn from_env() -> Self {
        let storage_backend = env_var("STORAGE_BACKEND").as_deref().map(StorageBackend::from_env_str).unwrap_or(StorageBackend::Memory);

        Settings {
            environment: env_var("ENV").as_deref().map(Environment::from_env_str).unwrap_or(Environment::Development),
            version: env_var("VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            grpc_port: env_parse_or("GRPC_PORT", 9001),
            http_port: env_parse_or("HTTP_PORT", 9001),
            prompt_port: env_parse_or("PROMPT_PORT", 9002),
            deploy_port: env_parse_or("DEPLOY_PORT", 9005),
            storage_backend,
            database: DatabaseSettings {
                host: env_var("DB_HOST"),
                port: env_parse_or("DB_PORT", 5432),
                user: env_var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                password: env_var("DB_PASSWORD").unwrap_or_default(),
                name: env_var("DB_NAME").unwrap_or_else(|| "llm_platform".to_string()),
                sslmode: env_var("DB_SSLMODE").unwrap_or_else(|| "prefer".to_string()),
            },
            redis_url: env_var("REDIS_URL"),
            observe_endpoint: env_var("OBSERVE_ENDPOINT"),
            log_level: env_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: env_var("LOG_FORMAT").as_deref().map(LogFormat::from_env_str).unwrap_or(LogFormat::Text),
            tracing_enabled: env_bool_or("TRACING_ENABLED", false),
            tracing_sampling: env_parse_or("TRACING_SAMPLING", 0.0f64).clamp(0.0, 1.0),
            providers: ProviderKeys {
                openai_api_key: env_var("OPENAI_API_KEY"),
                anthropic_api_key: env_var("ANTHROPIC_API_KEY"),
                google_api_key: env_var("GOOGLE_API_KEY"),
                together_api_key: env_var("TOGETHER_API_KEY"),
                openrouter_api_key: env_var("OPENROUTER_API_KEY"),
                ollama_base_url: env_var("OLLAMA_BASE_URL"),
                aws_access_key_id: env_var("AWS_ACCESS_KEY_ID"),
                aws_secret_access_key: env_var("AWS_SECRET_ACCESS_KEY"),
                aws_session_token: env_var("AWS_SESSION_TOKEN"),
                aws_region: env_var("AWS_REGION"),
                vertex_project_id: env_var("VERTEX_PROJECT_ID"),
                vertex_location: env_var("VERTEX_LOCATION"),
            },
        }
    }

    /// Fails fast on combinations that can't be reconciled at runtime —
    /// unlike individual key parsing, this is allowed to return an error.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.storage_backend == StorageBackend::Postgres && self.database.host.is_none() {
            return Err(crate::error::PlatformError::failed_precondition(
                "STORAGE_BACKEND=postgres requires DB_HOST to be set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_or_falls_back_on_malformed_value() {
        env::set_var("TEST_MALFORMED_PORT", "not-a-number");
        assert_eq!(env_parse_or::<u16>("TEST_MALFORMED_PORT", 9001), 9001);
        env::remove_var("TEST_MALFORMED_PORT");
    }

    #[test]
    fn validate_fails_fast_for_unreachable_postgres_backend() {
        let mut settings = Settings::from_env();
        settings.storage_backend = StorageBackend::Postgres;
        settings.database.host = None;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_passes_for_memory_backend_regardless_of_database_settings() {
        let mut settings = Settings::from_env();
        settings.storage_backend = StorageBackend::Memory;
        settings.database.host = None;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn tracing_sampling_is_clamped_into_zero_one() {
        env::set_var("TRACING_SAMPLING", "5.0");
        let settings = Settings::from_env();
        assert_eq!(settings.tracing_sampling, 1.0);
        env::remove_var("TRACING_SAMPLING");
    }
}
