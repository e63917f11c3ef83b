use axum::http::HeaderMap;
use redis::aio::MultiplexedConnection;

use crate::error::AppError;

/// Checks a rate limit counter stored in Redis.
///
/// Uses the INCR + EXPIRE strategy:
/// - Increments a counter for `key`
/// - On first increment, sets TTL to `window_secs`
/// - Fails with `RateLimited` once the counter exceeds `max_attempts`
///
/// Without a Redis connection every request is let through.
pub async fn check_rate_limit(
    redis: Option<&MultiplexedConnection>,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), AppError> {
    let Some(redis) = redis else {
        return Ok(());
    };
    let mut redis = redis.clone();

    let count: u64 = redis::cmd("INCR")
        .arg(key)
        .query_async(&mut redis)
        .await
        .unwrap_or(0);

    if count == 1 {
        // Set TTL only on first increment to avoid resetting the window on each attempt
        let _: Result<(), _> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut redis)
            .await;
    }

    if count > max_attempts {
        tracing::warn!(key, count, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(())
}

/// Client IP as forwarded by the reverse proxy.
/// Priority: X-Real-IP, then the first X-Forwarded-For entry.
pub fn real_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_redis_never_limits() {
        for _ in 0..10 {
            assert!(check_rate_limit(None, "rate:test", 1, 60).await.is_ok());
        }
    }

    #[test]
    fn prefers_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(real_ip(&headers), "10.0.0.1");
        headers.insert("x-real-ip", "192.168.1.9".parse().unwrap());
        assert_eq!(real_ip(&headers), "192.168.1.9");
        assert_eq!(real_ip(&HeaderMap::new()), "unknown");
    }
}
