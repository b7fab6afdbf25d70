//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Shared key for traffic whose client address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A client's bucket plus the last time the client was seen.
struct RateBucket {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Token bucket limiter keyed by client address.
///
/// One mutex guards the whole map: lookup, insert, refill+deduct and the
/// sweeper's deletions are mutually exclusive.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, RateBucket>>,
    capacity: f64,
    refill_rate: f64,
    idle_ttl: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(
            config.burst_size,
            config.requests_per_second,
            Duration::from_secs(config.idle_ttl_secs),
        )
    }

    /// `burst` tokens of capacity, refilled at `per_second` tokens per second.
    pub fn with_limits(burst: u32, per_second: u32, idle_ttl: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: f64::from(burst),
            refill_rate: f64::from(per_second),
            idle_ttl,
        }
    }

    /// Admit or reject one request from `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");

        let entry = buckets.entry(key.to_string()).or_insert_with(|| RateBucket {
            bucket: TokenBucket::new(self.capacity, now),
            last_seen: now,
        });

        entry.last_seen = now;
        entry.bucket.try_acquire(self.capacity, self.refill_rate, now)
    }

    /// Evict buckets idle for longer than the idle threshold. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        let idle_ttl = self.idle_ttl;

        buckets.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= idle_ttl);

        before - buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.buckets
            .lock()
            .expect("rate limiter mutex poisoned")
            .contains_key(key)
    }
}

/// Resolve the rate limit key for a request.
///
/// The peer address is used unless `trust_forwarded_for` is set, in which case
/// the first `X-Forwarded-For` hop (or `X-Real-IP`) takes precedence. Anything
/// that does not parse as an IP address maps to [`UNKNOWN_CLIENT`].
pub fn client_key(peer: Option<SocketAddr>, headers: &HeaderMap, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        forwarded_client(headers)
    } else {
        None
    };

    let candidate = forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()));

    candidate
        .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.config.rate_limit;
    if !config.enabled {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(peer, request.headers(), config.trust_forwarded_for);

    if state.limiter.allow(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        RateLimiter::with_limits(10, 5, Duration::from_secs(180))
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter();
        let t0 = Instant::now();

        for i in 0..10 {
            assert!(limiter.allow_at("10.0.0.1", t0), "request {} should pass", i);
        }
        assert!(!limiter.allow_at("10.0.0.1", t0));
    }

    #[test]
    fn test_refill_after_one_second() {
        let limiter = limiter();
        let t0 = Instant::now();
        for _ in 0..11 {
            limiter.allow_at("10.0.0.1", t0);
        }

        let t1 = t0 + Duration::from_secs(1);
        let admitted = (0..10).filter(|_| limiter.allow_at("10.0.0.1", t1)).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let limiter = limiter();
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));

        let later = t0 + Duration::from_secs(60);
        let admitted = (0..20).filter(|_| limiter.allow_at("10.0.0.1", later)).count();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter();
        let t0 = Instant::now();
        for _ in 0..10 {
            assert!(limiter.allow_at("10.0.0.1", t0));
        }
        assert!(!limiter.allow_at("10.0.0.1", t0));
        assert!(limiter.allow_at("10.0.0.2", t0));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_concurrent_callers_share_one_burst() {
        let limiter = Arc::new(limiter());
        let t0 = Instant::now();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.allow_at("10.0.0.1", t0))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 10);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_rejected_requests_refresh_last_seen() {
        let limiter = RateLimiter::with_limits(1, 1, Duration::from_secs(180));
        let t0 = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", t0));

        let t1 = t0 + Duration::from_millis(100);
        assert!(!limiter.allow_at("10.0.0.1", t1));

        // Idle measured from the rejected call, not the admitted one.
        assert_eq!(limiter.sweep_at(t1 + Duration::from_secs(180)), 0);
        assert_eq!(limiter.sweep_at(t1 + Duration::from_secs(181)), 1);
    }

    #[test]
    fn test_sweep_evicts_only_idle() {
        let limiter = limiter();
        let t0 = Instant::now();
        limiter.allow_at("idle", t0);
        limiter.allow_at("active", t0 + Duration::from_secs(120));

        let evicted = limiter.sweep_at(t0 + Duration::from_secs(200));
        assert_eq!(evicted, 1);
        assert!(!limiter.contains("idle"));
        assert!(limiter.contains("active"));
    }

    #[test]
    fn test_evicted_client_starts_with_full_bucket() {
        let limiter = limiter();
        let t0 = Instant::now();
        for _ in 0..10 {
            limiter.allow_at("10.0.0.1", t0);
        }
        let later = t0 + Duration::from_secs(300);
        limiter.sweep_at(later);

        let admitted = (0..20).filter(|_| limiter.allow_at("10.0.0.1", later)).count();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_client_key_uses_peer() {
        let peer: SocketAddr = "192.168.1.7:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));

        assert_eq!(client_key(Some(peer), &headers, false), "192.168.1.7");
        assert_eq!(client_key(None, &headers, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_client_key_trusts_forwarded_when_enabled() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(Some(peer), &headers, true), "203.0.113.9");

        let mut real_ip = HeaderMap::new();
        real_ip.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(client_key(Some(peer), &real_ip, true), "2001:db8::1");

        let mut garbage = HeaderMap::new();
        garbage.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_key(Some(peer), &garbage, true), UNKNOWN_CLIENT);

        assert_eq!(client_key(Some(peer), &HeaderMap::new(), true), "10.0.0.1");
    }
}
