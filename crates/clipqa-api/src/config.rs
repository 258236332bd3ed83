//! API configuration.

use std::collections::HashSet;

use clipqa_models::review::DEFAULT_LOCK_TIMEOUT_SECS;
use clipqa_models::LockPolicy;

/// Which record store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-process store for local runs without a database.
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Expected `iss` claim, when set
    pub jwt_issuer: Option<String>,
    /// Reviewers allowed to use admin routes (lowercased)
    pub admin_emails: HashSet<String>,
    /// How long a review lock stays valid
    pub lock_timeout_secs: u64,
    pub store_backend: StoreBackend,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
            jwt_secret: String::new(),
            jwt_issuer: None,
            admin_emails: HashSet::new(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS as u64,
            store_backend: StoreBackend::Postgres,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rate_limit_rps = env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps);

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps,
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(rate_limit_rps * 2),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: std::env::var("AUTH_JWT_SECRET").unwrap_or_default(),
            jwt_issuer: std::env::var("AUTH_JWT_ISSUER").ok().filter(|s| !s.trim().is_empty()),
            admin_emails: std::env::var("REVIEW_ADMIN_EMAILS")
                .map(|s| parse_admins(&s))
                .unwrap_or_default(),
            lock_timeout_secs: env_parse("REVIEW_LOCK_TIMEOUT_SECS").unwrap_or(defaults.lock_timeout_secs),
            store_backend: std::env::var("STORE_BACKEND")
                .map(|s| StoreBackend::parse(&s))
                .unwrap_or(defaults.store_backend),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy::from_secs(self.lock_timeout_secs)
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        self.admin_emails.contains(&identity.trim().to_lowercase())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_admins(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
