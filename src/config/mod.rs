//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults for missing fields)
//!     → loader.rs (JWT_SECRET / SERVER_PORT / DATABASE_PATH overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AppConfig;
pub use schema::AuthConfig;
pub use schema::BootstrapConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::RateLimitConfig;
