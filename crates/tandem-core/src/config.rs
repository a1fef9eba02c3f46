//! Configuration module
//!
//! Server, store, cache, realtime and repository-host settings loaded from the environment.

use std::env;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CACHE_TTL_SECS: u64 = 300;
const CACHE_MEMORY_CAPACITY: usize = 10_000;
const WS_OUTBOUND_BUFFER: usize = 256;
const MESSAGE_PAGE_MAX: i64 = 100;
const JWT_SECRET_MIN_LEN: usize = 32;

/// Which store implementation backs the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    Postgres,
    Memory,
}

impl FromStr for StoreBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackendKind::Postgres),
            "memory" => Ok(StoreBackendKind::Memory),
            other => Err(anyhow::anyhow!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            )),
        }
    }
}

/// Which cache implementation backs the cache-aside layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
    Disabled,
}

impl FromStr for CacheBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackendKind::Redis),
            "memory" => Ok(CacheBackendKind::Memory),
            "disabled" | "none" | "off" => Ok(CacheBackendKind::Disabled),
            other => Err(anyhow::anyhow!(
                "CACHE_BACKEND must be 'redis', 'memory' or 'disabled', got '{}'",
                other
            )),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,

    pub store_backend: StoreBackendKind,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,

    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,

    pub cache_backend: CacheBackendKind,
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
    pub cache_memory_capacity: usize,

    pub ws_outbound_buffer: usize,
    pub message_page_max: i64,

    // Repository host integration
    pub repo_host_api_url: Option<String>,
    pub repo_host_token: Option<String>,
    pub webhook_callback_url: Option<String>,
    pub webhook_secret: Option<String>,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;
        let cache_backend = env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            store_backend,
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_issuer: non_empty("JWT_ISSUER"),
            cache_backend,
            redis_url: non_empty("REDIS_URL"),
            cache_ttl_seconds: parse_or("CACHE_TTL_SECONDS", CACHE_TTL_SECS),
            cache_memory_capacity: parse_or("CACHE_MEMORY_CAPACITY", CACHE_MEMORY_CAPACITY),
            ws_outbound_buffer: parse_or("WS_OUTBOUND_BUFFER", WS_OUTBOUND_BUFFER),
            message_page_max: parse_or("MESSAGE_PAGE_MAX", MESSAGE_PAGE_MAX),
            repo_host_api_url: non_empty("REPO_HOST_API_URL"),
            repo_host_token: non_empty("REPO_HOST_TOKEN"),
            webhook_callback_url: non_empty("WEBHOOK_CALLBACK_URL"),
            webhook_secret: non_empty("WEBHOOK_SECRET"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Development defaults: in-memory store and cache, no repository host.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Config {
            server_port: DEFAULT_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            store_backend: StoreBackendKind::Memory,
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            jwt_secret: jwt_secret.into(),
            jwt_issuer: None,
            cache_backend: CacheBackendKind::Memory,
            redis_url: None,
            cache_ttl_seconds: CACHE_TTL_SECS,
            cache_memory_capacity: CACHE_MEMORY_CAPACITY,
            ws_outbound_buffer: WS_OUTBOUND_BUFFER,
            message_page_max: MESSAGE_PAGE_MAX,
            repo_host_api_url: None,
            repo_host_token: None,
            webhook_callback_url: None,
            webhook_secret: None,
        }
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < JWT_SECRET_MIN_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                JWT_SECRET_MIN_LEN
            ));
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.store_backend == StoreBackendKind::Postgres {
            match self.database_url.as_deref() {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                Some(_) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when STORE_BACKEND=postgres"
                    ))
                }
            }
        }

        if self.cache_backend == CacheBackendKind::Redis && self.redis_url.is_none() {
            return Err(anyhow::anyhow!(
                "REDIS_URL must be set when CACHE_BACKEND=redis"
            ));
        }

        if self.ws_outbound_buffer == 0 {
            return Err(anyhow::anyhow!("WS_OUTBOUND_BUFFER must be greater than 0"));
        }

        if self.message_page_max <= 0 {
            return Err(anyhow::anyhow!("MESSAGE_PAGE_MAX must be greater than 0"));
        }

        if self.repo_host_token.is_some() && self.repo_host_api_url.is_none() {
            return Err(anyhow::anyhow!(
                "REPO_HOST_API_URL must be set when REPO_HOST_TOKEN is provided"
            ));
        }

        Ok(())
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// Whether repository webhooks should be registered on import
    pub fn webhooks_enabled(&self) -> bool {
        self.repo_host_token.is_some() && self.webhook_callback_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_local_config_is_valid() {
        let config = Config::local(SECRET);
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
        assert!(!config.webhooks_enabled());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let config = Config::local("short");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = Config::local(SECRET);
        config.store_backend = StoreBackendKind::Postgres;
        assert!(config.validate().is_err());

        config.database_url = Some("mysql://localhost/db".to_string());
        assert!(config.validate().is_err());

        config.database_url = Some("postgresql://localhost/tandem".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_requires_url() {
        let mut config = Config::local(SECRET);
        config.cache_backend = CacheBackendKind::Redis;
        assert!(config.validate().is_err());
        config.redis_url = Some("redis://127.0.0.1:6379".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let mut config = Config::local(SECRET);
        config.environment = "production".to_string();
        assert!(config.validate().is_err());
        config.cors_origins = vec!["https://app.example.com".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!(
            "Postgres".parse::<StoreBackendKind>().ok(),
            Some(StoreBackendKind::Postgres)
        );
        assert_eq!(
            "memory".parse::<StoreBackendKind>().ok(),
            Some(StoreBackendKind::Memory)
        );
        assert!("sqlite".parse::<StoreBackendKind>().is_err());
        assert_eq!(
            "off".parse::<CacheBackendKind>().ok(),
            Some(CacheBackendKind::Disabled)
        );
    }
}
