use std::env;
use std::time::Duration;

use crate::services::poller::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub signup_poll: BackoffPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = BackoffPolicy::default();
        let signup_poll = BackoffPolicy {
            max_attempts: optional("SIGNUP_POLL_MAX_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
            base_delay: optional("SIGNUP_POLL_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            multiplier: optional("SIGNUP_POLL_MULTIPLIER")?.unwrap_or(defaults.multiplier),
            max_delay: defaults.max_delay,
            jitter: optional("SIGNUP_POLL_JITTER")?.unwrap_or(defaults.jitter),
        };
        signup_poll
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid SIGNUP_POLL_* settings: {e}"))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into())
                .trim_end_matches('/')
                .to_string(),
            signup_poll,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

fn optional<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key).ok().filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}
