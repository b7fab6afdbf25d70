//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the task API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Token signing and password hashing.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// SQLite database location.
    pub database: DatabaseConfig,

    /// Default administrator account.
    pub bootstrap: BootstrapConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret. When unset, the insecure development secret is used.
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours.
    pub token_ttl_hours: u64,

    /// bcrypt work factor (4..=31).
    pub bcrypt_cost: u32,

    /// Allow `POST /api/register` with `"role": "admin"`.
    pub allow_admin_registration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allow_admin_registration: false,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,

    /// How often idle buckets are evicted, in seconds.
    pub sweep_interval_secs: u64,

    /// A bucket untouched for this long is evicted, in seconds.
    pub idle_ttl_secs: u64,

    /// Key clients by X-Forwarded-For / X-Real-IP instead of the peer address.
    /// Only enable behind a trusted reverse proxy.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 5,
            burst_size: 10,
            sweep_interval_secs: 60,
            idle_ttl_secs: 180,
            trust_forwarded_for: false,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or ":memory:".
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "tasks.db".to_string(),
        }
    }
}

/// Default administrator created on first start.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Create the admin when no admin account exists.
    pub enabled: bool,

    pub username: String,

    pub email: String,

    pub password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "admin123".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}
