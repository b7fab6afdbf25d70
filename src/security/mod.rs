//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket; 429 when empty)
//!     → access_control.rs (protected routes: Bearer token → Claims)
//!     → handler
//!
//! Background:
//!     sweeper.rs (evict idle buckets every interval, stops on shutdown)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Verification failures are indistinguishable to clients
//! - No trust in client input (forwarded headers are opt-in)

pub mod access_control;
pub mod headers;
pub mod rate_limit;
pub mod sweeper;

pub use access_control::{require_auth, AuthError, CurrentUser};
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use sweeper::BucketSweeper;
