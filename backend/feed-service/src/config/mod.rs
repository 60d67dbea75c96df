use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Bearer token validation. Without a secret every request is anonymous.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Placement name sponsored creatives are selected for
    #[serde(default = "default_placement")]
    pub placement: String,
    /// How far back the recency fallback looks for events
    #[serde(default = "default_fallback_window_days")]
    pub fallback_window_days: i64,
    /// `max-age` of the private Cache-Control hint
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
    /// Disables the ranking RPC entirely (recency feed only)
    #[serde(default = "default_ranking_enabled")]
    pub ranking_enabled: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            placement: default_placement(),
            fallback_window_days: default_fallback_window_days(),
            cache_max_age_secs: default_cache_max_age_secs(),
            ranking_enabled: default_ranking_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub timeout_seconds: i64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let breaker_defaults = CircuitBreakerSettings::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: std::env::var("FEED_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("FEED_SERVICE_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                acquire_timeout_secs: std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_acquire_timeout_secs),
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            },
            feed: FeedConfig {
                placement: std::env::var("FEED_PLACEMENT").unwrap_or_else(|_| default_placement()),
                fallback_window_days: std::env::var("FEED_FALLBACK_WINDOW_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_fallback_window_days),
                cache_max_age_secs: std::env::var("FEED_CACHE_MAX_AGE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_cache_max_age_secs),
                ranking_enabled: std::env::var("FEED_RANKING_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
            },
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: std::env::var("RANKING_BREAKER_FAILURE_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(breaker_defaults.failure_threshold),
                success_threshold: std::env::var("RANKING_BREAKER_SUCCESS_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(breaker_defaults.success_threshold),
                timeout_seconds: std::env::var("RANKING_BREAKER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(breaker_defaults.timeout_seconds),
            },
        })
    }
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_placement() -> String {
    "feed".to_string()
}

fn default_fallback_window_days() -> i64 {
    7
}

fn default_cache_max_age_secs() -> u64 {
    10
}

fn default_ranking_enabled() -> bool {
    true
}
