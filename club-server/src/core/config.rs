use crate::utils::rate_limit::{EXCHANGE_LIMIT, LOGIN_BONUS_LIMIT, RateLimitConfig};

/// Server configuration
///
/// # Environment variables
///
/// Every setting can be overridden through the environment:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | DATABASE_PATH | /var/lib/club/club.db | SQLite database file |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | WEBHOOK_SECRET | (empty) | Payment provider signing secret; empty disables verification |
/// | WEBHOOK_TOLERANCE_SECS | 300 | Max signature timestamp skew |
/// | EXCHANGE_RATE_MAX | 5 | Exchange redemptions per window per member |
/// | EXCHANGE_RATE_WINDOW_SECS | 60 | Exchange rate-limit window |
/// | LOGIN_RATE_MAX | 3 | Login bonus claims per window per member |
/// | LOGIN_RATE_WINDOW_SECS | 60 | Login bonus rate-limit window |
/// | LOG_DIR | (none) | Daily-rolling log file directory |
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub db_path: String,
    /// Running environment: development | staging | production
    pub environment: String,
    /// Payment provider webhook signing secret
    pub webhook_secret: String,
    /// Accepted signature timestamp skew (seconds)
    pub webhook_tolerance_secs: i64,
    /// Exchange redemption rate limit
    pub exchange_limit: RateLimitConfig,
    /// Login bonus claim rate limit
    pub login_bonus_limit: RateLimitConfig,
    /// Optional directory for rolling log files
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "/var/lib/club/club.db".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            exchange_limit: RateLimitConfig::new(
                env_or("EXCHANGE_RATE_MAX", EXCHANGE_LIMIT.max_requests),
                env_or("EXCHANGE_RATE_WINDOW_SECS", EXCHANGE_LIMIT.window_seconds),
            ),
            login_bonus_limit: RateLimitConfig::new(
                env_or("LOGIN_RATE_MAX", LOGIN_BONUS_LIMIT.max_requests),
                env_or("LOGIN_RATE_WINDOW_SECS", LOGIN_BONUS_LIMIT.window_seconds),
            ),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
