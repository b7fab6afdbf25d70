//! Authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/login:
//!     → password.rs (bcrypt verify against stored hash)
//!     → codec.rs (issue HS256 token: user_id, role, iat, exp)
//!
//! Protected request:
//!     → security::access_control (extract "Bearer <token>")
//!     → codec.rs (verify: algorithm, expiry, signature)
//!     → Claims attached to request extensions
//!     → policy.rs (owner/admin decision inside handlers)
//! ```
//!
//! # Design Decisions
//! - Only HMAC algorithms are accepted; `none` and asymmetric schemes are malformed
//! - Expiry is checked before the signature so expired tokens always report `Expired`
//! - Role is only ever read from a verified token, never from request input

pub mod claims;
pub mod codec;
pub mod password;
pub mod policy;
pub mod secret;

pub use claims::{Claims, Role};
pub use codec::{CodecError, TokenCodec};
pub use secret::SigningSecret;
