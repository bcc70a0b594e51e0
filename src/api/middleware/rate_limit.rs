//! Rate limiting middleware.
//!
//! Per-user and per-IP request limits with a fixed window. The login
//! endpoint runs under a tight limiter to slow credential stuffing; the
//! rest of the API shares a generous one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header::HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;

use super::auth::CurrentUser;

/// Rate limiter tracking request counts per key (user id or IP).
#[derive(Debug)]
pub struct RateLimiter {
    /// Map of key -> (request count, window start time)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Returns `Ok(remaining)` when the request is allowed, or
    /// `Err(retry_after_secs)` when the key is over its limit.
    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, u64> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let entry = requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            entry.0 = 1;
            entry.1 = now;
            return Ok(self.max_requests.saturating_sub(1));
        }

        if entry.0 >= self.max_requests {
            let retry_after = self.window.as_secs() - now.duration_since(entry.1).as_secs();
            return Err(retry_after.max(1));
        }

        entry.0 += 1;
        Ok(self.max_requests.saturating_sub(entry.0))
    }

    /// Drop entries whose window has passed. Call periodically to bound
    /// memory.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window);
    }
}

/// Rate limiting middleware keyed by authenticated user, falling back to
/// the TCP peer address. Emits `X-RateLimit-*` headers and answers 429
/// with `Retry-After` when over the limit.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = if let Some(user) = request.extensions().get::<CurrentUser>() {
        format!("user:{}", user.user_id)
    } else {
        extract_client_ip(&request)
    };

    match limiter.check_rate_limit(&key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;

            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&limiter.max_requests.to_string()) {
                headers.insert("X-RateLimit-Limit", value);
            }
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                headers.insert("X-RateLimit-Remaining", value);
            }

            response
        }
        Err(retry_after) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            )
                .into_response();

            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("Retry-After", value);
            }
            if let Ok(value) = HeaderValue::from_str(&limiter.max_requests.to_string()) {
                headers.insert("X-RateLimit-Limit", value);
            }
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

            response
        }
    }
}

/// Client key from the TCP peer address.
///
/// Proxy headers (X-Forwarded-For, X-Real-IP) are client-spoofable and
/// deliberately ignored; without ConnectInfo all anonymous requests share
/// one bucket.
fn extract_client_ip(request: &Request) -> String {
    if let Some(connect_info) = request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return format!("ip:{}", connect_info.0.ip());
    }

    "ip:unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // RateLimiter
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_allows_within_limit_and_blocks_over() {
        let limiter = RateLimiter::new(3, 60);

        assert_eq!(limiter.check_rate_limit("k").await, Ok(2));
        assert_eq!(limiter.check_rate_limit("k").await, Ok(1));
        assert_eq!(limiter.check_rate_limit("k").await, Ok(0));
        assert!(limiter.check_rate_limit("k").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_after_within_window() {
        let limiter = RateLimiter::new(1, 60);
        let _ = limiter.check_rate_limit("login:burst").await;
        match limiter.check_rate_limit("login:burst").await {
            Err(retry_after) => assert!((1..=60).contains(&retry_after)),
            Ok(_) => panic!("expected rate limit error"),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(2, 60);
        for _ in 0..2 {
            let _ = limiter.check_rate_limit("user:a").await;
        }
        assert!(limiter.check_rate_limit("user:a").await.is_err());
        assert!(limiter.check_rate_limit("user:b").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_reset() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check_rate_limit("reset").await.is_ok());
        assert!(limiter.check_rate_limit("reset").await.is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_rate_limit("reset").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_entries() {
        let limiter = RateLimiter::new(5, 1);
        let _ = limiter.check_rate_limit("stale").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let _ = limiter.check_rate_limit("fresh").await;

        limiter.cleanup_expired().await;

        let requests = limiter.requests.read().await;
        assert!(!requests.contains_key("stale"));
        assert!(requests.contains_key("fresh"));
    }

    // -----------------------------------------------------------------------
    // extract_client_ip
    // -----------------------------------------------------------------------

    #[test]
    fn test_spoofable_headers_ignored() {
        let request = axum::extract::Request::builder()
            .header("X-Forwarded-For", "192.168.1.1")
            .header("X-Real-IP", "10.20.30.40")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&request), "ip:unknown");
    }

    #[test]
    fn test_connect_info_used_when_present() {
        use std::net::SocketAddr;
        let addr: SocketAddr = "192.168.1.100:12345".parse().unwrap();
        let mut request = axum::extract::Request::builder()
            .header("X-Forwarded-For", "1.2.3.4")
            .body(axum::body::Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(addr));
        assert_eq!(extract_client_ip(&request), "ip:192.168.1.100");
    }
}
